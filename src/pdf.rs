use crate::models::GenerationResult;
use printpdf::*;
use std::io::BufWriter;

const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const LINE: f32 = 7.0;

/// A4 landscape proposal summary (text only): style, categories and the
/// identified items with their estimates.
pub fn generate_pdf(
    style: &str,
    categories: &[String],
    result: &GenerationResult,
) -> Result<Vec<u8>, printpdf::Error> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Interior proposal: {}", truncate(style, 48)),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
    let mut current = doc.get_page(page).get_layer(layer);

    current.use_text("Interior Design Proposal", 20.0, Mm(15.0), Mm(PAGE_H - 20.0), &bold);
    current.use_text(format!("Style: {}", truncate(style, 140)), 11.0, Mm(15.0), Mm(PAGE_H - 32.0), &font);
    if !categories.is_empty() {
        current.use_text(format!("Categories: {}", categories.join(", ")), 10.0, Mm(15.0), Mm(PAGE_H - 40.0), &font);
    }
    current.use_text(
        format!("Generated {}", result.generated_at.format("%Y-%m-%d %H:%M UTC")),
        8.0,
        Mm(15.0),
        Mm(PAGE_H - 47.0),
        &font,
    );

    let mut y = PAGE_H - 60.0;
    if result.items.is_empty() {
        current.use_text("No item details could be identified.", 10.0, Mm(15.0), Mm(y), &font);
    }
    for item in &result.items {
        if y < 20.0 {
            let (p, l) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Items");
            current = doc.get_page(p).get_layer(l);
            y = PAGE_H - 20.0;
        }
        current.use_text(truncate(&item.category, 80), 11.0, Mm(15.0), Mm(y), &bold);
        let maker = [item.brand.as_deref(), item.product_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" | ");
        if !maker.is_empty() {
            current.use_text(truncate(&maker, 90), 10.0, Mm(110.0), Mm(y), &font);
        }
        if let Some(price) = &item.price {
            current.use_text(truncate(price, 40), 10.0, Mm(230.0), Mm(y), &font);
        }
        y -= LINE;
    }

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer)?;
    }
    Ok(buf)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
