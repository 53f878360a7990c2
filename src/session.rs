//! Form state for the single browser session and the result state machine.

use serde::Serialize;
use tracing::info;

use crate::{
    data_uri::DataUri,
    error::{CollageError, GENERATION_FAILED_MESSAGE, NO_CATEGORY_MESSAGE},
    ingest::ReferenceImages,
    models::{is_known_category, CollageRequest, GenerationResult, IdentifiedItem, FURNITURE_CATEGORIES},
};

pub const DOWNLOAD_FILE_NAME: &str = "interior-collage.png";
pub const ESTIMATE_DISCLAIMER: &str =
    "Brands, product names and prices are estimates from AI image analysis and are for reference only.";

#[derive(Debug, Clone, PartialEq)]
pub enum ResultState {
    Idle,
    Loading,
    Success(GenerationResult),
    Failed { message: String },
}

impl ResultState {
    fn status(&self) -> Status {
        match self {
            Self::Idle => Status::Idle,
            Self::Loading => Status::Loading,
            Self::Success(_) => Status::Success,
            Self::Failed { .. } => Status::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Loading,
    Success,
    Failed,
}

#[derive(Debug)]
pub struct Session {
    style_description: String,
    selected: Vec<String>,
    references: ReferenceImages,
    result: ResultState,
    // Rejected-submit message; shown alongside whatever result is current.
    notice: Option<String>,
}

impl Session {
    pub fn new(default_style: impl Into<String>) -> Self {
        Self {
            style_description: default_style.into(),
            selected: Vec::new(),
            references: ReferenceImages::new(),
            result: ResultState::Idle,
            notice: None,
        }
    }

    pub fn result(&self) -> &ResultState {
        &self.result
    }

    /// Appends an already decoded upload batch.
    pub fn add_references(&mut self, batch: Vec<DataUri>) {
        self.references.extend(batch);
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn style_description(&self) -> &str {
        &self.style_description
    }

    pub fn set_style(&mut self, style: impl Into<String>) {
        self.style_description = style.into();
    }

    /// Flips a catalogue category on or off. Returns whether it is now selected.
    pub fn toggle_category(&mut self, name: &str) -> Result<bool, CollageError> {
        if !is_known_category(name) {
            return Err(CollageError::UnknownCategory(name.to_string()));
        }
        if let Some(pos) = self.selected.iter().position(|c| c == name) {
            self.selected.remove(pos);
            Ok(false)
        } else {
            self.selected.push(name.to_string());
            Ok(true)
        }
    }

    pub fn remove_reference(&mut self, index: usize) -> Result<(), CollageError> {
        if index >= self.references.len() {
            return Err(CollageError::ImageIndex(index));
        }
        self.references = self.references.without(index);
        Ok(())
    }

    /// Starts an attempt: rejects overlapping submits and empty selections,
    /// then clears the previous outcome and enters `Loading`.
    pub fn begin_submit(&mut self) -> Result<CollageRequest, CollageError> {
        if self.result == ResultState::Loading {
            return Err(CollageError::Busy);
        }
        if self.selected.is_empty() {
            self.notice = Some(NO_CATEGORY_MESSAGE.to_string());
            return Err(CollageError::Validation);
        }
        self.notice = None;
        self.result = ResultState::Loading;
        Ok(CollageRequest {
            style_description: self.style_description.clone(),
            selected_categories: self.selected.clone(),
            reference_images: self.references.as_slice().to_vec(),
        })
    }

    /// Stores the outcome of the attempt started by [`Session::begin_submit`].
    pub fn complete(&mut self, outcome: &Result<GenerationResult, CollageError>) {
        self.result = match outcome {
            Ok(result) => ResultState::Success(result.clone()),
            Err(_) => ResultState::Failed { message: GENERATION_FAILED_MESSAGE.to_string() },
        };
        info!("session result is now {:?}", self.result.status());
    }

    pub fn current_image(&self) -> Option<&DataUri> {
        match &self.result {
            ResultState::Success(r) => Some(&r.image),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        let (image, items, error) = match &self.result {
            ResultState::Success(r) => (Some(r.image.clone()), r.items.clone(), self.notice.clone()),
            ResultState::Failed { message } => (None, Vec::new(), Some(message.clone())),
            ResultState::Idle | ResultState::Loading => (None, Vec::new(), self.notice.clone()),
        };
        let disclaimer = (!items.is_empty()).then(|| ESTIMATE_DISCLAIMER.to_string());
        SessionView {
            style_description: self.style_description.clone(),
            categories: FURNITURE_CATEGORIES
                .iter()
                .map(|name| CategoryOption {
                    name: name.to_string(),
                    checked: self.selected.iter().any(|c| c == name),
                })
                .collect(),
            reference_images: self.references.as_slice().to_vec(),
            status: self.result.status(),
            can_submit: self.result != ResultState::Loading,
            download_name: image.as_ref().map(|_| DOWNLOAD_FILE_NAME.to_string()),
            image,
            items,
            disclaimer,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    pub name: String,
    pub checked: bool,
}

/// Everything the page needs to render the form and the result panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub style_description: String,
    pub categories: Vec<CategoryOption>,
    pub reference_images: Vec<DataUri>,
    pub status: Status,
    pub can_submit: bool,
    pub image: Option<DataUri>,
    pub items: Vec<IdentifiedItem>,
    pub download_name: Option<String>,
    pub disclaimer: Option<String>,
    pub error: Option<String>,
}
