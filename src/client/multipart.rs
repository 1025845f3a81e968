//! Replayable multipart form descriptions.
//!
//! `reqwest::multipart::Form` is consumed on send, so uploads are described
//! by value and turned into a fresh `Form` for every attempt.

use reqwest::multipart::{Form, Part};

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub enum FormPart {
    Text(String),
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, FormPart)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), FormPart::Text(value.into())));
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push((
            name.into(),
            FormPart::File {
                bytes: bytes.into(),
                file_name: file_name.into(),
                mime: mime.map(str::to_string),
            },
        ));
        self
    }

    pub fn parts(&self) -> &[(String, FormPart)] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Build a fresh `reqwest` form for one attempt.
    pub fn to_form(&self) -> Result<Form, ApiError> {
        self.parts
            .iter()
            .try_fold(Form::new(), |form, (name, part)| match part {
                FormPart::Text(value) => Ok(form.text(name.clone(), value.clone())),
                FormPart::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|e| {
                            ApiError::InvalidRequest(format!("{name}: invalid mime type: {e}"))
                        })?;
                    }
                    Ok(form.part(name.clone(), file))
                }
            })
    }
}
