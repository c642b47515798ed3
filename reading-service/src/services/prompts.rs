//! Prompt construction for palm and kundali readings.
//!
//! Every reading is a system role plus one user message. Image readings
//! embed the upload as a data URI next to the instruction text; birth
//! detail readings are text only.

use crate::models::Landmark;
use crate::services::image::DecodedImage;
use crate::services::providers::{ChatMessage, ChatRequest};

pub const PALM_SYSTEM_ROLE: &str = "You are a palmistry expert AI.";
pub const KUNDALI_SYSTEM_ROLE: &str = "You are an expert Vedic astrologer.";

pub const PALM_MAX_TOKENS: u32 = 900;
pub const KUNDALI_IMAGE_MAX_TOKENS: u32 = 900;
pub const KUNDALI_DETAILS_MAX_TOKENS: u32 = 950;

/// Returned in place of a prediction when the landmark pass finds no hand.
pub const NO_HAND_MESSAGE: &str = "No hand detected. Please upload a clear palm image.";

/// Returned in place of an analysis for PDF uploads; the model is not called.
pub const PDF_UNSUPPORTED_MESSAGE: &str = "PDF kundali analysis is not supported yet. \
Please upload an image of your kundali chart or provide your birth details.";

/// Birth details for a text-only kundali reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthDetails {
    pub name: String,
    pub dob: String,
    pub tob: String,
    pub place: String,
}

/// The accepted shapes of a kundali request.
#[derive(Debug, Clone)]
pub enum KundaliInput {
    Details(BirthDetails),
    Image {
        image: DecodedImage,
        filename: String,
        content_type: String,
        name: Option<String>,
    },
    Pdf {
        filename: String,
    },
}

/// Either a prompt for the model or a fixed answer that needs no model call.
#[derive(Debug, Clone, PartialEq)]
pub enum KundaliPrompt {
    Model(ChatRequest),
    Rejected(&'static str),
}

pub fn palm_prompt(image: &DecodedImage, landmarks: Option<&[Landmark]>) -> ChatRequest {
    let instruction = match landmarks {
        Some(points) => format!(
            "You are a world-class palmistry expert.\n\
             Analyze the following hand:\n\
             - Landmark coordinates (index: x, y, z in normalized image space):\n{}\n\
             Based on the palm image and the detected hand geometry, provide a detailed \
             palmistry reading including personality, health, career, relationships, and \
             unique features.",
            format_landmarks(points)
        ),
        None => "You are a world-class palmistry expert.\n\
                 Analyze the palm in the attached image. Examine the major lines (heart, head, \
                 life, fate), the mounts and the shape of the hand and fingers, then provide a \
                 detailed palmistry reading including personality, health, career, \
                 relationships, and unique features."
            .to_string(),
    };

    ChatRequest {
        messages: vec![
            ChatMessage::system(PALM_SYSTEM_ROLE),
            ChatMessage::user_with_image(instruction, image.data_uri()),
        ],
        max_tokens: PALM_MAX_TOKENS,
    }
}

pub fn kundali_prompt(input: &KundaliInput) -> KundaliPrompt {
    match input {
        KundaliInput::Details(details) => KundaliPrompt::Model(kundali_details_prompt(details)),
        KundaliInput::Image { image, name, .. } => {
            KundaliPrompt::Model(kundali_image_prompt(image, name.as_deref()))
        }
        KundaliInput::Pdf { .. } => KundaliPrompt::Rejected(PDF_UNSUPPORTED_MESSAGE),
    }
}

fn kundali_details_prompt(details: &BirthDetails) -> ChatRequest {
    let instruction = format!(
        "Prepare a Vedic astrology (kundali) reading for the following person.\n\
         Name: {}\n\
         Date of birth: {}\n\
         Time of birth: {}\n\
         Place of birth: {}\n\n\
         Work out the ascendant (lagna), moon sign and the key planetary placements for \
         these birth details, then give a detailed analysis covering personality, career, \
         marriage and relationships, health, finances, and suggested remedies.",
        details.name.trim(),
        details.dob.trim(),
        details.tob.trim(),
        details.place.trim()
    );

    ChatRequest {
        messages: vec![
            ChatMessage::system(KUNDALI_SYSTEM_ROLE),
            ChatMessage::user_text(instruction),
        ],
        max_tokens: KUNDALI_DETAILS_MAX_TOKENS,
    }
}

fn kundali_image_prompt(image: &DecodedImage, name: Option<&str>) -> ChatRequest {
    let subject = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!(" for {}", name))
        .unwrap_or_default();

    let instruction = format!(
        "The attached image is a kundali (Vedic birth chart){}.\n\
         Read the houses, signs and planetary positions shown in the chart and give a \
         detailed analysis covering personality, career, marriage and relationships, \
         health, finances, and suggested remedies.",
        subject
    );

    ChatRequest {
        messages: vec![
            ChatMessage::system(KUNDALI_SYSTEM_ROLE),
            ChatMessage::user_with_image(instruction, image.data_uri()),
        ],
        max_tokens: KUNDALI_IMAGE_MAX_TOKENS,
    }
}

fn format_landmarks(points: &[Landmark]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| format!("  {}: {}", index, point))
        .collect::<Vec<_>>()
        .join("\n")
}
