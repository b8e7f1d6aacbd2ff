//! Media asset model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad media category, derived from the MIME type on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    /// Classify a MIME type; anything not image/video/audio is a document
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            _ => MediaType::Document,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Document => write!(f, "document"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            "document" => Ok(MediaType::Document),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Stored media file with its registered renditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub filename: String,
    pub storage_url: String,
    /// SHA-256 hex digest for uploaded files
    pub checksum: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Seconds, for audio and video
    pub duration: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub variants: Vec<MediaVariant>,
}

/// Alternate rendition of an asset (one per format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaVariant {
    pub id: i64,
    pub format: String,
    pub url: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub bitrate: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVariantInput {
    pub format: String,
    pub url: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub bitrate: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateMediaInput {
    pub media_type: MediaType,
    pub filename: String,
    pub storage_url: String,
    pub checksum: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub uploaded_by: Option<i64>,
    pub variants: Vec<CreateVariantInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), MediaType::Image);
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("audio/ogg"), MediaType::Audio);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Document);
        assert_eq!(MediaType::from_mime(""), MediaType::Document);
    }

    #[test]
    fn test_media_type_serializes_as_type() {
        let now = Utc::now();
        let asset = MediaAsset {
            id: 1,
            media_type: MediaType::Image,
            filename: "a.png".to_string(),
            storage_url: "/uploads/a.png".to_string(),
            checksum: None,
            width: Some(10),
            height: Some(20),
            duration: None,
            metadata: None,
            uploaded_by: None,
            created_at: now,
            updated_at: now,
            variants: vec![],
        };
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["width"], 10);
    }
}
