//! Audit records appended for every completed reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User id recorded when the caller does not send one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Only this many characters of an uploaded base64 image are kept.
pub const IMAGE_PREFIX_LEN: usize = 100;

/// Collections readings are appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingCollection {
    Palm,
    Kundali,
}

impl ReadingCollection {
    pub fn name(&self) -> &'static str {
        match self {
            ReadingCollection::Palm => "palm_readings",
            ReadingCollection::Kundali => "kundali_readings",
        }
    }
}

/// What the caller sent, reduced to what is worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input_type", rename_all = "lowercase")]
pub enum InputSummary {
    Palm {
        image_prefix: String,
        /// Keypoints found by the landmark pass, absent when it did not run.
        #[serde(skip_serializing_if = "Option::is_none")]
        landmark_count: Option<i32>,
    },
    Details {
        name: String,
        dob: String,
        tob: String,
        place: String,
    },
    Image {
        filename: String,
        content_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl InputSummary {
    pub fn palm(image_base64: &str, landmark_count: Option<usize>) -> Self {
        InputSummary::Palm {
            image_prefix: image_base64.chars().take(IMAGE_PREFIX_LEN).collect(),
            landmark_count: landmark_count.map(|count| count as i32),
        }
    }

    pub fn input_type(&self) -> &'static str {
        match self {
            InputSummary::Palm { .. } => "palm",
            InputSummary::Details { .. } => "details",
            InputSummary::Image { .. } => "image",
        }
    }
}

/// One append-only document in `palm_readings` or `kundali_readings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub user_id: String,

    #[serde(flatten)]
    pub input: InputSummary,

    /// Text returned by the model.
    pub prediction: String,

    /// Model identifier that produced the prediction.
    pub model: String,

    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl ReadingRecord {
    pub fn new(user_id: Option<&str>, input: InputSummary, prediction: String, model: &str) -> Self {
        Self {
            user_id: normalize_user_id(user_id),
            input,
            prediction,
            model: model.to_string(),
            timestamp: Utc::now(),
        }
    }
}

pub fn normalize_user_id(user_id: Option<&str>) -> String {
    user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_user_is_anonymous() {
        assert_eq!(normalize_user_id(None), ANONYMOUS_USER);
        assert_eq!(normalize_user_id(Some("   ")), ANONYMOUS_USER);
        assert_eq!(normalize_user_id(Some(" u-42 ")), "u-42");
    }

    #[test]
    fn palm_summary_truncates_image() {
        let image = "A".repeat(IMAGE_PREFIX_LEN * 3);
        match InputSummary::palm(&image, Some(21)) {
            InputSummary::Palm {
                image_prefix,
                landmark_count,
            } => {
                assert_eq!(image_prefix.len(), IMAGE_PREFIX_LEN);
                assert_eq!(landmark_count, Some(21));
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn details_record_serializes_flat_with_input_type() {
        let record = ReadingRecord::new(
            Some("asha-1"),
            InputSummary::Details {
                name: "Asha".to_string(),
                dob: "1990-01-01".to_string(),
                tob: "10:00".to_string(),
                place: "Delhi".to_string(),
            },
            "Career looks bright".to_string(),
            "gpt-4o",
        );

        let doc = mongodb::bson::to_document(&record).unwrap();
        assert_eq!(doc.get_str("input_type").unwrap(), "details");
        assert_eq!(doc.get_str("name").unwrap(), "Asha");
        assert_eq!(doc.get_str("user_id").unwrap(), "asha-1");
        assert!(doc.get_datetime("timestamp").is_ok());
    }

    #[test]
    fn collection_names() {
        assert_eq!(ReadingCollection::Palm.name(), "palm_readings");
        assert_eq!(ReadingCollection::Kundali.name(), "kundali_readings");
    }
}
