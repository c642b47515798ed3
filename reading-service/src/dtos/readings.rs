use crate::services::image::DecodedImage;
use crate::services::prompts::{BirthDetails, KundaliInput};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

pub const MISSING_KUNDALI_INPUT: &str =
    "Provide either all fields (name, dob, tob, place) or a file.";
pub const UNSUPPORTED_KUNDALI_FILE: &str = "Only PDF or Image supported";

#[derive(Debug, Deserialize)]
pub struct PalmRequest {
    /// Base64 palm image; older clients send it as `image`.
    #[serde(default, alias = "image")]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PalmResponse {
    pub prediction: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KundaliResponse {
    pub analysis: String,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Birth details as submitted, trimmed. Every field must be non-blank.
#[derive(Debug, Clone, Validate)]
pub struct BirthDetailsForm {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub dob: String,
    #[validate(length(min = 1))]
    pub tob: String,
    #[validate(length(min = 1))]
    pub place: String,
}

impl From<BirthDetailsForm> for BirthDetails {
    fn from(form: BirthDetailsForm) -> Self {
        BirthDetails {
            name: form.name,
            dob: form.dob,
            tob: form.tob,
            place: form.place,
        }
    }
}

/// Multipart fields of a kundali request, before validation.
#[derive(Debug, Clone, Default)]
pub struct KundaliForm {
    pub name: Option<String>,
    pub dob: Option<String>,
    pub tob: Option<String>,
    pub place: Option<String>,
    pub user_id: Option<String>,
    pub file: Option<UploadedFile>,
}

impl KundaliForm {
    /// Pick the input shape. A file always wins over birth fields.
    pub fn into_input(self) -> Result<KundaliInput, AppError> {
        if let Some(file) = self.file {
            let essence = media_type_essence(&file.content_type);

            if essence.starts_with("image/") {
                let image = DecodedImage::from_bytes(file.bytes)?;
                return Ok(KundaliInput::Image {
                    image,
                    filename: file.filename,
                    content_type: essence,
                    name: non_blank(self.name),
                });
            }

            if essence == "application/pdf" {
                return Ok(KundaliInput::Pdf {
                    filename: file.filename,
                });
            }

            return Err(AppError::BadRequest(anyhow::anyhow!(UNSUPPORTED_KUNDALI_FILE)));
        }

        let details = BirthDetailsForm {
            name: trimmed(self.name),
            dob: trimmed(self.dob),
            tob: trimmed(self.tob),
            place: trimmed(self.place),
        };
        details.validate().map_err(|e| {
            tracing::debug!(error = %e, "Incomplete kundali birth details");
            AppError::BadRequest(anyhow::anyhow!(MISSING_KUNDALI_INPUT))
        })?;

        Ok(KundaliInput::Details(details.into()))
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Image/PNG; charset=binary` -> `image/png`
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
