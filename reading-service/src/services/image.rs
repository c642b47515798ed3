//! Base64 image decoding and format sniffing for uploaded palm and chart images.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbImage};
use service_core::error::AppError;
use std::io::Cursor;
use thiserror::Error;

/// Formats the chat model accepts as image input.
const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Image is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format; expected PNG, JPEG, GIF or WebP")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Encode(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
            other => AppError::BadRequest(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Raw image bytes whose format has been recognised.
#[derive(Clone)]
pub struct DecodedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodedImage {{ bytes: <{} bytes>, format: {:?} }}",
            self.bytes.len(),
            self.format
        )
    }
}

/// Decode a base64 image, tolerating a `data:<mime>;base64,` prefix and line wrapping.
pub fn decode_base64_image(input: &str) -> Result<DecodedImage, ImageError> {
    let payload = strip_data_uri(input.trim());
    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Err(ImageError::Empty);
    }

    let bytes = STANDARD.decode(cleaned)?;
    DecodedImage::from_bytes(bytes)
}

fn strip_data_uri(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some((_, payload)) = input.split_once(";base64,") {
            return payload;
        }
    }
    input
}

impl DecodedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let format = image::guess_format(&bytes).map_err(|_| ImageError::UnsupportedFormat)?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(ImageError::UnsupportedFormat);
        }

        Ok(Self { bytes, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            _ => "application/octet-stream",
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Inline form accepted by chat models as an `image_url`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }

    /// Fully decode into an RGB pixel grid.
    pub fn to_rgb(&self) -> Result<RgbImage, ImageError> {
        image::load_from_memory_with_format(&self.bytes, self.format)
            .map(|img| img.to_rgb8())
            .map_err(|e| ImageError::Decode(e.to_string()))
    }
}

/// PNG-encode a pixel grid.
pub fn encode_png(pixels: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(pixels.clone())
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}
