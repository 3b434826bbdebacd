//! Fingerprint image fetched from a scanner.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::{GrayImage, ImageFormat as EncodedFormat};
use log::info;

use crate::caps::{ImageFormat, ImageSpec};
use crate::error::{Result, ScannerError};

/// Raw image as provided by the driver, with the geometry from the
/// capabilities cached when the scanner was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub(crate) fn new(spec: ImageSpec, data: Vec<u8>) -> Self {
        Self {
            format: spec.format,
            width: spec.width,
            height: spec.height,
            data,
        }
    }

    pub fn spec(&self) -> ImageSpec {
        ImageSpec {
            format: self.format,
            width: self.width,
            height: self.height,
        }
    }

    /// Convert to a grayscale buffer where 0x00 is black.
    ///
    /// Fails if the payload size does not match the declared geometry.
    pub fn to_luma(&self) -> Result<GrayImage> {
        let expected = self.spec().byte_len();
        if self.data.len() != expected {
            return Err(ScannerError::InvalidImage(format!(
                "{}x{} {} image needs {} bytes, got {}",
                self.width,
                self.height,
                self.format,
                expected,
                self.data.len()
            )));
        }

        let pixels = match self.format {
            ImageFormat::Gray8 => self.data.clone(),
            ImageFormat::Gray8Inverted => self.data.iter().map(|v| 0xff - v).collect(),
        };

        GrayImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| ScannerError::InvalidImage("buffer does not fit geometry".to_string()))
    }

    /// Encode as PNG into `writer`.
    pub fn write_png<W: Write>(&self, mut writer: W) -> Result<()> {
        let luma = self.to_luma()?;
        let mut encoded = Cursor::new(Vec::new());
        luma.write_to(&mut encoded, EncodedFormat::Png)
            .map_err(|e| ScannerError::Encode(e.to_string()))?;
        writer.write_all(encoded.get_ref())?;
        writer.flush()?;
        Ok(())
    }

    /// Encode as PNG into a file at `path`.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_png(BufWriter::new(file))?;
        info!("Saved {}x{} image to {}", self.width, self.height, path.display());
        Ok(())
    }
}
