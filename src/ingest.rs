//! Turns uploaded reference photos into data URIs.
//!
//! A batch is committed only if every file in it is readable as an image; the ordered
//! sequence of references lives in [`ReferenceImages`].

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::data_uri::DataUri;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0} is empty")]
    Empty(String),
    #[error("{name} is not an image ({reason})")]
    Decode { name: String, reason: String },
    #[error("decode task failed: {0}")]
    Join(String),
}

/// One file from the picker.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self { name: name.into(), content_type, bytes: bytes.into() }
    }
}

fn decode_file(file: FileUpload) -> Result<DataUri, IngestError> {
    if file.bytes.is_empty() {
        return Err(IngestError::Empty(file.name));
    }
    // The sniffed format wins over the declared type; formats the sniffer
    // does not know (HEIC and friends) are taken on the declared `image/*`.
    let mime = match (image::guess_format(&file.bytes), file.content_type.as_deref()) {
        (Ok(format), _) => format.to_mime_type().to_string(),
        (Err(_), Some(ct)) if ct.starts_with("image/") => ct.to_string(),
        (Err(e), ct) => {
            return Err(IngestError::Decode {
                name: file.name,
                reason: format!("declared {}: {e}", ct.unwrap_or("no content type")),
            })
        }
    };
    Ok(DataUri::from_bytes(mime, &file.bytes))
}

/// Sniffs every file of a batch on the blocking pool and joins them in
/// upload order. Any failure fails the whole batch.
pub async fn decode_batch(files: Vec<FileUpload>) -> Result<Vec<DataUri>, IngestError> {
    let count = files.len();
    let handles: Vec<_> = files
        .into_iter()
        .map(|f| tokio::task::spawn_blocking(move || decode_file(f)))
        .collect();

    let mut decoded = Vec::with_capacity(count);
    let mut first_err = None;
    for handle in handles {
        let res = handle.await.map_err(|e| IngestError::Join(e.to_string())).and_then(|r| r);
        match res {
            Ok(uri) => decoded.push(uri),
            Err(e) => {
                warn!("reference image rejected: {}", e);
                first_err.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }
    info!("decoded {} reference image(s)", decoded.len());
    Ok(decoded)
}

/// Ordered reference photos. Indices are positional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReferenceImages(Vec<DataUri>);

impl ReferenceImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[DataUri] {
        &self.0
    }

    /// Appends a decoded batch after the existing images.
    pub fn extend(&mut self, batch: Vec<DataUri>) {
        self.0.extend(batch);
    }

    /// Copy of the sequence without the element at `index`. An out-of-range
    /// index leaves the sequence unchanged.
    pub fn without(&self, index: usize) -> Self {
        Self(
            self.0
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, uri)| uri.clone())
                .collect(),
        )
    }
}

impl From<Vec<DataUri>> for ReferenceImages {
    fn from(v: Vec<DataUri>) -> Self {
        Self(v)
    }
}
