//! Image subtype classification by file signature.

use async_trait::async_trait;
use asclepius_common::{AsclepiusError, ImageClassifier, Result};

/// Subtype for ordinary raster images.
pub const GENERIC: &str = "generic";
/// Subtype for DICOM medical imaging files.
pub const DICOM: &str = "dicom";

/// Offset of the `DICM` magic after the DICOM preamble.
const DICOM_MAGIC_OFFSET: usize = 128;

/// Classifies images from their leading bytes. Raster formats are `generic`;
/// DICOM files are `dicom`; anything else is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureClassifier;

impl SignatureClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Name of the detected container format.
    pub fn detect_format(bytes: &[u8]) -> Option<&'static str> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some("png")
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some("jpeg")
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some("gif")
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some("webp")
        } else if bytes.starts_with(b"BM") {
            Some("bmp")
        } else if bytes
            .get(DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + 4)
            .is_some_and(|magic| magic == b"DICM")
        {
            Some("dicom")
        } else {
            None
        }
    }
}

#[async_trait]
impl ImageClassifier for SignatureClassifier {
    async fn classify(&self, image: &[u8]) -> Result<String> {
        match Self::detect_format(image) {
            Some("dicom") => Ok(DICOM.to_string()),
            Some(_) => Ok(GENERIC.to_string()),
            None => Err(AsclepiusError::Classifier(format!(
                "Unrecognized image format ({} bytes)",
                image.len()
            ))),
        }
    }
}
