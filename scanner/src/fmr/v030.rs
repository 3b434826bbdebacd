//! Records in the 0.30 draft layout.
//!
//! Decoded for inspection and for conversion with [`V030Record::to_v20`];
//! scanners never produce them.

use super::v20::{self, V20Record, View};
use super::{FmrError, FmrErrorKind, Minutia, Reader, Record, RecordError, FORMAT_ID};

/// "030\0"
pub const VERSION: u32 = 0x3033_3000;

const MIN_TOTAL_LEN: usize = 54;
const MIN_REPRESENTATION_LEN: u32 = 39;
const MIN_SAMPLING_RATE: u16 = 98;
const MAX_IMAGE_SIZE: u16 = 0x3fff;
/// Quality value of a block whose quality could not be computed.
pub const QUALITY_FAILED: u8 = 255;
/// Minutia quality values with a special meaning.
pub const MINUTIA_QUALITY_NOT_REPORTED: u8 = 254;
pub const MINUTIA_QUALITY_FAILED: u8 = 255;

const DEVICE_TECHNOLOGIES: [&str; 21] = [
    "unknown or unspecified",
    "white light optical TIR",
    "white light optical direct view on platen",
    "white light optical touchless",
    "monochromatic visible optical TIR",
    "monochromatic visible optical direct view on platen",
    "monochromatic visible optical touchless",
    "monochromatic IR optical TIR",
    "monochromatic IR direct view on platen",
    "monochromatic IR touchless",
    "multispectral optical TIR",
    "multispectral optical direct view on platen",
    "multispectral optical touchless",
    "electro luminescent",
    "semiconductor capacitive",
    "semiconductor RF",
    "semiconductor thermal",
    "pressure sensitive",
    "ultrasound",
    "mechanical",
    "glass fiber",
];

const RIDGE_ENDING_TYPES: [&str; 2] = [
    "intersection of three valley bifurcation",
    "ridge skeleton endpoints",
];

pub fn device_technology_name(technology: u8) -> Option<&'static str> {
    DEVICE_TECHNOLOGIES.get(usize::from(technology)).copied()
}

/// Single fingers share the 2005 codes; 13 and up name finger groups.
pub fn finger_position_name(position: u8) -> Option<&'static str> {
    match position {
        0..=10 => v20::finger_position_name(position),
        13 => Some("plain right four fingers"),
        14 => Some("plain left four fingers"),
        15 => Some("left thumb and right thumb"),
        40 => Some("right index and middle"),
        41 => Some("right middle and ring"),
        42 => Some("right ring and middle"),
        43 => Some("left index and middle"),
        44 => Some("left middle and ring"),
        45 => Some("left ring and middle"),
        46 => Some("right index and left index"),
        47 => Some("right index and middle and ring"),
        48 => Some("right middle and ring and little"),
        49 => Some("left index and middle and ring"),
        50 => Some("left middle and ring and little"),
        _ => None,
    }
}

pub fn impression_type_name(impression: u8) -> Option<&'static str> {
    match impression {
        0..=7 => v20::impression_type_name(impression),
        8 => Some("live-scan swipe"),
        9 => Some("vertical roll"),
        24 => Some("live-scan optical contactless plain"),
        28 => Some("other"),
        29 => Some("unknown"),
        _ => None,
    }
}

pub fn ridge_ending_type_name(ridge_ending: u8) -> Option<&'static str> {
    RIDGE_ENDING_TYPES.get(usize::from(ridge_ending)).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct V030Record {
    /// Total length from the header.
    pub total_length: u32,
    /// Whether representations carry certification blocks.
    pub device_certification: bool,
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualityBlock {
    /// 0 to 100, or [`QUALITY_FAILED`].
    pub value: u8,
    pub vendor: u16,
    pub algorithm: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CertificationBlock {
    pub authority: u16,
    pub scheme: u8,
}

/// One finger representation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Representation {
    /// Length from the representation header.
    pub length: u32,
    pub capture_time: CaptureTime,
    pub device_technology: u8,
    pub device_vendor: u16,
    pub device_type: u16,
    pub quality_blocks: Vec<QualityBlock>,
    pub certification_blocks: Vec<CertificationBlock>,
    pub finger_position: u8,
    pub representation_number: u8,
    /// Pixels per centimetre.
    pub sampling_rate_x: u16,
    pub sampling_rate_y: u16,
    pub impression_type: u8,
    pub size_x: u16,
    pub size_y: u16,
    /// 5 without per-minutia quality, 6 with.
    pub minutia_field_length: u8,
    pub ridge_ending_type: u8,
    pub minutiae: Vec<Minutia>,
    pub extended_data: Vec<u8>,
}

impl Representation {
    pub fn has_minutia_quality(&self) -> bool {
        self.minutia_field_length == 6
    }
}

impl V030Record {
    /// Convert to a 2005 record with one view per representation.
    ///
    /// Every representation must share image size and sampling rate. Finger
    /// quality is left unset, reserved minutia qualities become "not
    /// reported" and extended data is dropped.
    pub fn to_v20(&self) -> Result<V20Record, RecordError> {
        if self.representations.len() > usize::from(u8::MAX) {
            return Err(RecordError::TooManyViews(self.representations.len()));
        }

        let Some(first) = self.representations.first() else {
            return Ok(V20Record::default());
        };
        let geometry =
            |r: &Representation| (r.size_x, r.size_y, r.sampling_rate_x, r.sampling_rate_y);
        if self.representations.iter().any(|r| geometry(r) != geometry(first)) {
            return Err(RecordError::MixedGeometry);
        }

        let mut record = V20Record {
            size_x: first.size_x,
            size_y: first.size_y,
            resolution_x: first.sampling_rate_x,
            resolution_y: first.sampling_rate_y,
            ..V20Record::default()
        };
        for repr in &self.representations {
            if v20::finger_position_name(repr.finger_position).is_none() {
                return Err(RecordError::IncompatibleFingerPosition(repr.finger_position));
            }
            if v20::impression_type_name(repr.impression_type).is_none() {
                return Err(RecordError::IncompatibleImpressionType(repr.impression_type));
            }
            if repr.representation_number > 0xf {
                return Err(RecordError::FieldOutOfRange {
                    field: "representation number",
                    value: repr.representation_number.into(),
                });
            }

            let minutiae = repr
                .minutiae
                .iter()
                .map(|m| Minutia {
                    quality: match m.quality {
                        q if repr.has_minutia_quality() && q < MINUTIA_QUALITY_NOT_REPORTED => q,
                        _ => 0,
                    },
                    ..*m
                })
                .collect();

            record.views.push(View {
                finger_position: repr.finger_position,
                representation_number: repr.representation_number,
                impression_type: repr.impression_type,
                finger_quality: 0,
                minutiae,
                extended_data: Vec::new(),
            });
        }

        Ok(record)
    }
}

/// Decode a 0.30 record.
pub fn decode(data: &[u8]) -> Result<V030Record, FmrError> {
    let mut reader = Reader::new(data);
    let mut record = V030Record::default();
    match decode_into(&mut reader, &mut record) {
        Ok(()) => Ok(record),
        Err(kind) => Err(FmrError {
            kind,
            offset: reader.position(),
            partial: Box::new(Record::V030(record)),
        }),
    }
}

fn decode_into(r: &mut Reader<'_>, record: &mut V030Record) -> Result<(), FmrErrorKind> {
    if r.u32()? != FORMAT_ID {
        return Err(FmrErrorKind::InvalidFormatId);
    }
    if r.u32()? != VERSION {
        return Err(FmrErrorKind::InvalidVersion);
    }
    record.total_length = r.u32()?;
    if (record.total_length as usize) < MIN_TOTAL_LEN {
        return Err(FmrErrorKind::InvalidTotalLength);
    }
    r.set_limit(record.total_length as usize);

    let count = r.u16()?;
    if count == 0 {
        return Err(FmrErrorKind::InvalidNumberRepresentations);
    }
    record.device_certification = match r.u8()? {
        0 => false,
        1 => true,
        _ => return Err(FmrErrorKind::InvalidCertificationFlag),
    };

    for _ in 0..count {
        let mut repr = Representation::default();
        let result = decode_representation(r, &mut repr, record.device_certification);
        record.representations.push(repr);
        result?;
    }

    r.finish()
}

fn decode_representation(
    r: &mut Reader<'_>,
    repr: &mut Representation,
    certification: bool,
) -> Result<(), FmrErrorKind> {
    repr.length = r.u32()?;
    if repr.length < MIN_REPRESENTATION_LEN {
        return Err(FmrErrorKind::InvalidRepresentationLength);
    }

    repr.capture_time = CaptureTime {
        year: r.u16()?,
        month: r.u8()?,
        day: r.u8()?,
        hour: r.u8()?,
        minute: r.u8()?,
        second: r.u8()?,
        millisecond: r.u16()?,
    };
    repr.device_technology = r.u8()?;
    repr.device_vendor = r.u16()?;
    repr.device_type = r.u16()?;

    let quality_blocks = r.u8()?;
    for _ in 0..quality_blocks {
        let value = r.u8()?;
        if value > 100 && value != QUALITY_FAILED {
            return Err(FmrErrorKind::InvalidQualityValue);
        }
        repr.quality_blocks.push(QualityBlock {
            value,
            vendor: r.u16()?,
            algorithm: r.u16()?,
        });
    }

    if certification {
        let blocks = r.u8()?;
        for _ in 0..blocks {
            repr.certification_blocks.push(CertificationBlock {
                authority: r.u16()?,
                scheme: r.u8()?,
            });
        }
    }

    repr.finger_position = r.u8()?;
    if finger_position_name(repr.finger_position).is_none() {
        return Err(FmrErrorKind::InvalidFingerPosition);
    }
    repr.representation_number = r.u8()?;

    repr.sampling_rate_x = r.u16()?;
    if repr.sampling_rate_x < MIN_SAMPLING_RATE {
        return Err(FmrErrorKind::InvalidSamplingRate);
    }
    repr.sampling_rate_y = r.u16()?;
    if repr.sampling_rate_y < MIN_SAMPLING_RATE {
        return Err(FmrErrorKind::InvalidSamplingRate);
    }

    repr.impression_type = r.u8()?;
    if impression_type_name(repr.impression_type).is_none() {
        return Err(FmrErrorKind::InvalidImpressionType);
    }

    repr.size_x = r.u16()?;
    if repr.size_x > MAX_IMAGE_SIZE {
        return Err(FmrErrorKind::InvalidImageSize);
    }
    repr.size_y = r.u16()?;
    if repr.size_y > MAX_IMAGE_SIZE {
        return Err(FmrErrorKind::InvalidImageSize);
    }

    let byte = r.u8()?;
    repr.minutia_field_length = byte >> 4;
    if !matches!(repr.minutia_field_length, 5 | 6) {
        return Err(FmrErrorKind::InvalidMinutiaFieldLength);
    }
    repr.ridge_ending_type = byte & 0xf;
    if ridge_ending_type_name(repr.ridge_ending_type).is_none() {
        return Err(FmrErrorKind::InvalidRidgeEndingType);
    }

    let count = r.u8()?;
    if count == 0 {
        return Err(FmrErrorKind::InvalidNumberMinutiae);
    }
    for _ in 0..count {
        let mut minutia = Minutia::default();
        let result = decode_minutia(r, &mut minutia, repr.has_minutia_quality());
        repr.minutiae.push(minutia);
        result?;
    }

    let extended = r.u16()?;
    repr.extended_data = r.bytes(extended.into())?.to_vec();
    Ok(())
}

fn decode_minutia(
    r: &mut Reader<'_>,
    minutia: &mut Minutia,
    with_quality: bool,
) -> Result<(), FmrErrorKind> {
    r.minutia_position(minutia)?;
    minutia.angle = r.u8()?;
    if with_quality {
        minutia.quality = r.u8()?;
        if minutia.quality > 100 && minutia.quality < MINUTIA_QUALITY_NOT_REPORTED {
            return Err(FmrErrorKind::InvalidMinutiaQuality);
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::sample::{encode, Repr};
    use super::*;
    use crate::fmr::{self, MinutiaType};

    const POINTS: &[sample::Point] = &[(1, 40, 50, 10, 90), (2, 120, 80, 200, 254)];

    #[test]
    fn decodes_representation_fields() {
        let record = decode(&encode(&[Repr::new(POINTS)])).unwrap();
        assert!(!record.device_certification);
        assert_eq!(record.representations.len(), 1);

        let repr = &record.representations[0];
        assert_eq!(repr.capture_time.year, 2011);
        assert_eq!(
            device_technology_name(repr.device_technology),
            Some("semiconductor capacitive")
        );
        assert_eq!(
            repr.quality_blocks,
            vec![QualityBlock {
                value: 80,
                vendor: 0x0102,
                algorithm: 0x0003,
            }]
        );
        assert_eq!(finger_position_name(repr.finger_position), Some("left index"));
        assert_eq!(
            ridge_ending_type_name(repr.ridge_ending_type),
            Some("ridge skeleton endpoints")
        );
        assert_eq!(repr.minutiae[1].kind, MinutiaType::Bifurcation);
        assert_eq!(repr.minutiae[1].quality, 254);
    }

    #[test]
    fn generic_decode_falls_back_to_030() {
        let bytes = encode(&[Repr::new(POINTS)]);
        assert!(matches!(fmr::decode(&bytes), Ok(Record::V030(_))));
    }

    #[test]
    fn short_minutiae_carry_no_quality() {
        let mut repr = Repr::new(POINTS);
        repr.field_length = 5;
        let record = decode(&encode(&[repr])).unwrap();
        let repr = &record.representations[0];
        assert!(!repr.has_minutia_quality());
        assert!(repr.minutiae.iter().all(|m| m.quality == 0));
        assert_eq!(repr.minutiae[0].x, 40);
    }

    #[test]
    fn rejects_invalid_fields() {
        let mut repr = Repr::new(POINTS);
        repr.rate = 50;
        let err = decode(&encode(&[repr])).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidSamplingRate);

        let mut repr = Repr::new(POINTS);
        repr.position = 11;
        let err = decode(&encode(&[repr])).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidFingerPosition);

        let mut repr = Repr::new(POINTS);
        repr.field_length = 7;
        let err = decode(&encode(&[repr])).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidMinutiaFieldLength);
        let Record::V030(partial) = *err.partial else {
            panic!("partial record has the wrong version");
        };
        assert_eq!(partial.representations[0].sampling_rate_x, 197);
    }

    #[test]
    fn converts_to_2005_record() {
        let record = decode(&encode(&[Repr::new(POINTS), Repr::new(&POINTS[..1])])).unwrap();
        let converted = record.to_v20().unwrap();

        assert_eq!((converted.size_x, converted.size_y), (256, 360));
        assert_eq!(converted.resolution_x, 197);
        assert_eq!(converted.views.len(), 2);
        let view = &converted.views[0];
        assert_eq!(view.finger_position, 7);
        assert_eq!(view.finger_quality, 0);
        assert_eq!(view.minutiae[0].quality, 90);
        assert_eq!(view.minutiae[1].quality, 0);
        assert_eq!(view.minutiae[1].angle, 200);

        let bytes = converted.to_bytes().unwrap();
        assert_eq!(v20::decode(&bytes).unwrap(), converted);
    }

    #[test]
    fn conversion_rejects_what_2005_cannot_hold() {
        let mut second = Repr::new(POINTS);
        second.size = (300, 400);
        let record = decode(&encode(&[Repr::new(POINTS), second])).unwrap();
        assert_eq!(record.to_v20(), Err(RecordError::MixedGeometry));

        let mut group = Repr::new(POINTS);
        group.position = 13;
        let record = decode(&encode(&[group])).unwrap();
        assert_eq!(record.to_v20(), Err(RecordError::IncompatibleFingerPosition(13)));

        let mut contactless = Repr::new(POINTS);
        contactless.impression = 24;
        let record = decode(&encode(&[contactless])).unwrap();
        assert_eq!(record.to_v20(), Err(RecordError::IncompatibleImpressionType(24)));
    }
}
