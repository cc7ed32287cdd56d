//! Document format detection.
//!
//! Formats are recognised from their byte signature rather than from the
//! declared file name, since uploads frequently carry the wrong extension.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Number of leading bytes searched for the PDF header.
///
/// Readers tolerate leading garbage before `%PDF-` up to this offset.
const PDF_HEADER_SEARCH_WINDOW: usize = 1024;

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Formats recognised at the input boundary.
///
/// Only [`DocumentFormat::Pdf`] can be split; images are recognised so the
/// loader can report what it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// PDF format.
    Pdf,
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
}

impl DocumentFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Returns whether this format is an image format.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    /// Returns whether documents of this format can be split into fragments.
    pub fn is_splittable(&self) -> bool {
        matches!(self, Self::Pdf)
    }

    /// Attempts to detect the format from a MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Attempts to detect the format from a file extension, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Detects the format from the leading bytes of a buffer.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            return Some(Self::Png);
        }

        if bytes.starts_with(JPEG_SIGNATURE) {
            return Some(Self::Jpeg);
        }

        let window = &bytes[..bytes.len().min(PDF_HEADER_SEARCH_WINDOW)];
        window
            .windows(PDF_SIGNATURE.len())
            .any(|w| w == PDF_SIGNATURE)
            .then_some(Self::Pdf)
    }
}
