//! ISO/IEC 19794-2 finger minutiae records.
//!
//! Scanners hand out templates as 2005 records ([`v20`]). Records in the
//! older 0.30 layout ([`v030`]) can be decoded and converted to 2005 records.
//! All multi-byte fields are big-endian.

pub mod v030;
pub mod v20;

use thiserror::Error;

pub use v030::{Representation, V030Record};
pub use v20::{V20Record, View};

/// "FMR\0", shared by every record version.
pub const FORMAT_ID: u32 = 0x464d_5200;

/// Degrees per unit of a minutia angle.
pub const ANGLE_STEP_DEGREES: f64 = 1.40625;

/// A decoded record of either supported version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    V20(V20Record),
    V030(V030Record),
}

/// Minutia kinds, stored in the top two bits of the X coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinutiaType {
    #[default]
    Other,
    Termination,
    Bifurcation,
}

impl MinutiaType {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(MinutiaType::Other),
            1 => Some(MinutiaType::Termination),
            2 => Some(MinutiaType::Bifurcation),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            MinutiaType::Other => 0,
            MinutiaType::Termination => 1,
            MinutiaType::Bifurcation => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MinutiaType::Other => "other",
            MinutiaType::Termination => "termination",
            MinutiaType::Bifurcation => "bifurcation",
        }
    }
}

/// One ridge feature. Coordinates are 14-bit pixel positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Minutia {
    pub kind: MinutiaType,
    pub x: u16,
    pub y: u16,
    /// In units of [`ANGLE_STEP_DEGREES`].
    pub angle: u8,
    pub quality: u8,
}

impl Minutia {
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.angle) * ANGLE_STEP_DEGREES
    }
}

/// Why a record failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FmrErrorKind {
    #[error("premature end of data")]
    PrematureEnd,
    #[error("invalid format id")]
    InvalidFormatId,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid total length")]
    InvalidTotalLength,
    #[error("invalid reserved byte")]
    InvalidReservedByte,
    #[error("invalid number of representations")]
    InvalidNumberRepresentations,
    #[error("invalid device certification block flag")]
    InvalidCertificationFlag,
    #[error("invalid representation length")]
    InvalidRepresentationLength,
    #[error("invalid quality value")]
    InvalidQualityValue,
    #[error("invalid finger position")]
    InvalidFingerPosition,
    #[error("invalid sampling rate")]
    InvalidSamplingRate,
    #[error("invalid impression type")]
    InvalidImpressionType,
    #[error("invalid image size")]
    InvalidImageSize,
    #[error("invalid finger quality")]
    InvalidFingerQuality,
    #[error("invalid minutia field length")]
    InvalidMinutiaFieldLength,
    #[error("invalid ridge ending type")]
    InvalidRidgeEndingType,
    #[error("invalid number of minutiae")]
    InvalidNumberMinutiae,
    #[error("invalid minutia type")]
    InvalidMinutiaType,
    #[error("invalid minutia quality")]
    InvalidMinutiaQuality,
}

/// Decode failure with the byte offset it was detected at.
///
/// `partial` holds every field decoded up to that point, which is often
/// enough to see what a misbehaving encoder produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct FmrError {
    pub kind: FmrErrorKind,
    pub offset: usize,
    pub partial: Box<Record>,
}

/// A record that cannot be encoded or converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{0} views do not fit in a record (at most 255)")]
    TooManyViews(usize),

    #[error("{field} value {value} out of range")]
    FieldOutOfRange { field: &'static str, value: usize },

    #[error("views of different image size or resolution cannot share a record")]
    MixedGeometry,

    #[error("finger position {0} has no 2005 equivalent")]
    IncompatibleFingerPosition(u8),

    #[error("impression type {0} has no 2005 equivalent")]
    IncompatibleImpressionType(u8),
}

/// Decode a record, picking the version from its header.
pub fn decode(data: &[u8]) -> Result<Record, FmrError> {
    match v20::decode(data) {
        Ok(record) => Ok(Record::V20(record)),
        Err(e) if e.kind == FmrErrorKind::InvalidVersion => v030::decode(data).map(Record::V030),
        Err(e) => Err(e),
    }
}

/// Big-endian cursor that enforces the record's declared total length.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Reads past `limit` fail with [`FmrErrorKind::InvalidTotalLength`].
    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], FmrErrorKind> {
        let data = self.data;
        let Some(chunk) = data.get(self.pos..self.pos + n) else {
            self.pos = data.len();
            return Err(FmrErrorKind::PrematureEnd);
        };
        self.pos += n;
        if self.limit != 0 && self.pos > self.limit {
            return Err(FmrErrorKind::InvalidTotalLength);
        }
        Ok(chunk)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, FmrErrorKind> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, FmrErrorKind> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, FmrErrorKind> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Type bits and X coordinate, then Y; the top bits of Y are reserved.
    pub(crate) fn minutia_position(&mut self, minutia: &mut Minutia) -> Result<(), FmrErrorKind> {
        let word = self.u16()?;
        minutia.kind = MinutiaType::from_bits((word >> 14) as u8)
            .ok_or(FmrErrorKind::InvalidMinutiaType)?;
        minutia.x = word & 0x3fff;
        minutia.y = self.u16()? & 0x3fff;
        Ok(())
    }

    /// The whole declared length must have been consumed.
    pub(crate) fn finish(&self) -> Result<(), FmrErrorKind> {
        if self.pos < self.limit {
            return Err(FmrErrorKind::InvalidTotalLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_stops_at_end_of_data() {
        let mut reader = Reader::new(&[0x12, 0x34, 0x56]);
        assert_eq!(reader.u16(), Ok(0x1234));
        assert_eq!(reader.u16(), Err(FmrErrorKind::PrematureEnd));
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn reader_enforces_declared_length() {
        let mut reader = Reader::new(&[0, 0, 0, 0, 0, 0]);
        reader.set_limit(4);
        assert_eq!(reader.u32(), Ok(0));
        assert_eq!(reader.finish(), Ok(()));
        assert_eq!(reader.u8(), Err(FmrErrorKind::InvalidTotalLength));

        let mut short = Reader::new(&[0, 0, 0, 0]);
        short.set_limit(8);
        assert_eq!(short.u16(), Ok(0));
        assert_eq!(short.finish(), Err(FmrErrorKind::InvalidTotalLength));
    }

    #[test]
    fn minutia_type_lives_in_top_bits() {
        let mut reader = Reader::new(&[0x80 | 0x01, 0x02, 0xc0, 0x03]);
        let mut minutia = Minutia::default();
        reader.minutia_position(&mut minutia).unwrap();
        assert_eq!(minutia.kind, MinutiaType::Bifurcation);
        assert_eq!(minutia.x, 0x0102);
        assert_eq!(minutia.y, 0x0003);

        let mut reader = Reader::new(&[0xc0, 0x00, 0x00, 0x00]);
        assert_eq!(
            reader.minutia_position(&mut minutia),
            Err(FmrErrorKind::InvalidMinutiaType)
        );
    }

    #[test]
    fn angle_converts_to_degrees() {
        let minutia = Minutia {
            angle: 64,
            ..Minutia::default()
        };
        assert_eq!(minutia.angle_degrees(), 90.0);
    }

    #[test]
    fn garbage_is_not_a_record() {
        let err = decode(b"PNG\0 20\0").unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidFormatId);
        assert_eq!(err.offset, 4);
    }
}
