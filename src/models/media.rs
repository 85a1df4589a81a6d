use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FeedError;

/// Pending change to one attachment slot of an entity.
///
/// An absent form field means "leave as is", so clearing has to be spelled
/// out with a sentinel field when the request is built.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEdit<T> {
    Unchanged,
    Replace(T),
    Clear,
}

impl<T> Default for MediaEdit<T> {
    fn default() -> Self {
        MediaEdit::Unchanged
    }
}

impl<T> MediaEdit<T> {
    pub fn is_replace(&self) -> bool {
        matches!(self, MediaEdit::Replace(_))
    }

    pub fn replacement(&self) -> Option<&T> {
        match self {
            MediaEdit::Replace(v) => Some(v),
            _ => None,
        }
    }
}

/// A local image chosen for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| FeedError::Io(format!("Failed to read image {:?}: {}", path, e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        let mime = image_mime(&file_name)
            .ok_or_else(|| FeedError::validation(format!("{} is not a supported image", file_name)))?;
        Ok(ImageFile { path: path.to_path_buf(), file_name, mime, bytes })
    }

    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Self {
        ImageFile {
            path: PathBuf::from(file_name),
            file_name: file_name.to_string(),
            mime: image_mime(file_name).unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes,
        }
    }
}

/// Any `image/*` type the extension maps to.
fn image_mime(file_name: &str) -> Option<String> {
    mime_guess::from_path(file_name)
        .iter()
        .find(|m| m.type_().as_str() == "image")
        .map(|m| m.essence_str().to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(ImageFile),
}

/// Ordered multipart body, kept transport-agnostic so it can be inspected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormFields {
    pub fields: Vec<(String, FormValue)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), FormValue::Text(value.into())));
        self
    }

    pub fn file(mut self, name: &str, file: ImageFile) -> Self {
        self.fields.push((name.to_string(), FormValue::File(file)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FormValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn into_multipart(self) -> Result<reqwest::multipart::Form, FeedError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.fields {
            form = match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::File(file) => {
                    let part = reqwest::multipart::Part::bytes(file.bytes)
                        .file_name(file.file_name)
                        .mime_str(&file.mime)
                        .map_err(|e| FeedError::validation(format!("Bad image type: {}", e)))?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}
