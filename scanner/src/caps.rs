//! Scanner capability record.

use std::fmt;

use serde::Serialize;

/// Pixel encoding of images provided by a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    /// One byte per pixel, 0x00 black, 0xff white.
    #[serde(rename = "gray 8bit")]
    Gray8,
    /// One byte per pixel, 0x00 white, 0xff black.
    #[serde(rename = "gray 8bit inversed")]
    Gray8Inverted,
}

impl ImageFormat {
    /// Map the driver's format code; unknown codes yield `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ImageFormat::Gray8),
            1 => Some(ImageFormat::Gray8Inverted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Gray8 => "gray 8bit",
            ImageFormat::Gray8Inverted => "gray 8bit inversed",
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        1
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry and encoding of the images a scanner provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSpec {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageSpec {
    /// Expected payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// What a scanner can provide after a scan.
///
/// Absent fields mean "unsupported"; that is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSpec>,
    pub iso_template: bool,
    /// Set when the driver declared an image the binding cannot use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_issue: Option<String>,
}

impl Capabilities {
    pub fn provides_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn provides_iso_template(&self) -> bool {
        self.iso_template
    }
}
