//! ISO/IEC 19794-2:2005 records, as produced by scanner drivers.

use super::{FmrError, FmrErrorKind, Minutia, Reader, Record, RecordError, FORMAT_ID};

/// " 20\0"
pub const VERSION: u32 = 0x2032_3000;

/// Record header, including the reserved byte.
pub const HEADER_LEN: usize = 24;
/// View header plus the extended data length field.
pub const VIEW_OVERHEAD: usize = 6;
pub const MINUTIA_LEN: usize = 6;

const MAX_QUALITY: u8 = 100;

const FINGER_POSITIONS: [&str; 11] = [
    "unknown",
    "right thumb",
    "right index",
    "right middle",
    "right ring",
    "right little",
    "left thumb",
    "left index",
    "left middle",
    "left ring",
    "left little",
];

const IMPRESSION_TYPES: [&str; 9] = [
    "live-scan plain",
    "live-scan rolled",
    "nonlive-scan plain",
    "nonlive-scan rolled",
    "latent impression",
    "latent tracing",
    "latent photo",
    "latent lift",
    "swipe",
];

pub fn finger_position_name(position: u8) -> Option<&'static str> {
    FINGER_POSITIONS.get(usize::from(position)).copied()
}

pub fn impression_type_name(impression: u8) -> Option<&'static str> {
    IMPRESSION_TYPES.get(usize::from(impression)).copied()
}

/// A finger minutiae record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct V20Record {
    /// 4 bits.
    pub capture_equipment_certification: u8,
    /// 12 bits.
    pub capture_device_type: u16,
    pub size_x: u16,
    pub size_y: u16,
    /// Pixels per centimetre.
    pub resolution_x: u16,
    pub resolution_y: u16,
    pub views: Vec<View>,
}

/// One finger view of a record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct View {
    pub finger_position: u8,
    /// 4 bits.
    pub representation_number: u8,
    /// 4 bits.
    pub impression_type: u8,
    /// 0 to 100.
    pub finger_quality: u8,
    /// Minutia quality 0 means "not reported".
    pub minutiae: Vec<Minutia>,
    pub extended_data: Vec<u8>,
}

impl V20Record {
    /// Size of the encoded record, which is also its declared total length.
    pub fn encoded_len(&self) -> usize {
        let views: usize = self
            .views
            .iter()
            .map(|v| VIEW_OVERHEAD + v.minutiae.len() * MINUTIA_LEN + v.extended_data.len())
            .sum();
        HEADER_LEN + views
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        self.validate()?;

        let total = self.encoded_len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&FORMAT_ID.to_be_bytes());
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&(total as u32).to_be_bytes());
        let certification = u16::from(self.capture_equipment_certification) << 12;
        out.extend_from_slice(&(certification | self.capture_device_type).to_be_bytes());
        for value in [self.size_x, self.size_y, self.resolution_x, self.resolution_y] {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.push(self.views.len() as u8);
        out.push(0);

        for view in &self.views {
            out.push(view.finger_position);
            out.push((view.representation_number << 4) | view.impression_type);
            out.push(view.finger_quality);
            out.push(view.minutiae.len() as u8);
            for m in &view.minutiae {
                out.extend_from_slice(&((u16::from(m.kind.bits()) << 14) | m.x).to_be_bytes());
                out.extend_from_slice(&m.y.to_be_bytes());
                out.push(m.angle);
                out.push(m.quality);
            }
            out.extend_from_slice(&(view.extended_data.len() as u16).to_be_bytes());
            out.extend_from_slice(&view.extended_data);
        }

        Ok(out)
    }

    fn validate(&self) -> Result<(), RecordError> {
        fn check(field: &'static str, value: usize, max: usize) -> Result<(), RecordError> {
            if value > max {
                return Err(RecordError::FieldOutOfRange { field, value });
            }
            Ok(())
        }

        if self.views.len() > usize::from(u8::MAX) {
            return Err(RecordError::TooManyViews(self.views.len()));
        }
        check(
            "capture equipment certification",
            self.capture_equipment_certification.into(),
            0xf,
        )?;
        check("capture device type", self.capture_device_type.into(), 0xfff)?;

        for view in &self.views {
            check("representation number", view.representation_number.into(), 0xf)?;
            check("impression type", view.impression_type.into(), 0xf)?;
            check("number of minutiae", view.minutiae.len(), u8::MAX.into())?;
            check("extended data length", view.extended_data.len(), u16::MAX.into())?;
            for m in &view.minutiae {
                check("minutia x", m.x.into(), 0x3fff)?;
                check("minutia y", m.y.into(), 0x3fff)?;
            }
        }
        Ok(())
    }
}

/// Decode a 2005 record. Bytes past its declared length are ignored.
pub fn decode(data: &[u8]) -> Result<V20Record, FmrError> {
    let mut reader = Reader::new(data);
    let mut record = V20Record::default();
    match decode_into(&mut reader, &mut record) {
        Ok(()) => Ok(record),
        Err(kind) => Err(FmrError {
            kind,
            offset: reader.position(),
            partial: Box::new(Record::V20(record)),
        }),
    }
}

fn decode_into(r: &mut Reader<'_>, record: &mut V20Record) -> Result<(), FmrErrorKind> {
    if r.u32()? != FORMAT_ID {
        return Err(FmrErrorKind::InvalidFormatId);
    }
    if r.u32()? != VERSION {
        return Err(FmrErrorKind::InvalidVersion);
    }
    let total = r.u32()? as usize;
    if total < HEADER_LEN {
        return Err(FmrErrorKind::InvalidTotalLength);
    }
    r.set_limit(total);

    let device = r.u16()?;
    record.capture_equipment_certification = (device >> 12) as u8;
    record.capture_device_type = device & 0xfff;
    record.size_x = r.u16()?;
    record.size_y = r.u16()?;
    record.resolution_x = r.u16()?;
    record.resolution_y = r.u16()?;

    let views = r.u8()?;
    if r.u8()? != 0 {
        return Err(FmrErrorKind::InvalidReservedByte);
    }

    for _ in 0..views {
        let mut view = View::default();
        let result = decode_view(r, &mut view);
        record.views.push(view);
        result?;
    }

    r.finish()
}

fn decode_view(r: &mut Reader<'_>, view: &mut View) -> Result<(), FmrErrorKind> {
    view.finger_position = r.u8()?;
    if finger_position_name(view.finger_position).is_none() {
        return Err(FmrErrorKind::InvalidFingerPosition);
    }

    let byte = r.u8()?;
    view.representation_number = byte >> 4;
    view.impression_type = byte & 0xf;
    if impression_type_name(view.impression_type).is_none() {
        return Err(FmrErrorKind::InvalidImpressionType);
    }

    view.finger_quality = r.u8()?;
    if view.finger_quality > MAX_QUALITY {
        return Err(FmrErrorKind::InvalidFingerQuality);
    }

    let count = r.u8()?;
    for _ in 0..count {
        let mut minutia = Minutia::default();
        let result = decode_minutia(r, &mut minutia);
        view.minutiae.push(minutia);
        result?;
    }

    let extended = r.u16()?;
    view.extended_data = r.bytes(extended.into())?.to_vec();
    Ok(())
}

fn decode_minutia(r: &mut Reader<'_>, minutia: &mut Minutia) -> Result<(), FmrErrorKind> {
    r.minutia_position(minutia)?;
    minutia.angle = r.u8()?;
    minutia.quality = r.u8()?;
    if minutia.quality > MAX_QUALITY {
        return Err(FmrErrorKind::InvalidMinutiaQuality);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::dummy::iso_template_record;
    use crate::fmr::MinutiaType;

    fn dummy_record() -> Vec<u8> {
        iso_template_record(
            config::dummy::IMAGE_WIDTH as u16,
            config::dummy::IMAGE_HEIGHT as u16,
        )
    }

    #[test]
    fn decodes_dummy_template() {
        let record = decode(&dummy_record()).unwrap();
        assert_eq!(record.size_x, 192);
        assert_eq!(record.size_y, 256);
        assert_eq!(record.resolution_x, config::dummy::RESOLUTION);
        assert_eq!(record.views.len(), 1);

        let view = &record.views[0];
        assert_eq!(finger_position_name(view.finger_position), Some("right index"));
        assert_eq!(impression_type_name(view.impression_type), Some("live-scan plain"));
        assert_eq!(view.minutiae.len(), 6);
        assert_eq!(
            view.minutiae[0],
            Minutia {
                kind: MinutiaType::Termination,
                x: 62,
                y: 88,
                angle: 40,
                quality: 80,
            }
        );
        assert!(view.extended_data.is_empty());
    }

    #[test]
    fn dummy_template_reencodes_identically() {
        let bytes = dummy_record();
        let record = decode(&bytes).unwrap();
        assert_eq!(record.encoded_len(), bytes.len());
        assert_eq!(record.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn extended_data_survives_reencoding() {
        let mut record = decode(&dummy_record()).unwrap();
        record.capture_equipment_certification = 0x3;
        record.capture_device_type = 0x123;
        record.views[0].representation_number = 2;
        record.views[0].extended_data = vec![0, 1, 0, 3, 0xaa, 0xbb, 0xcc];
        record.views.push(View {
            finger_position: 7,
            impression_type: 8,
            ..View::default()
        });

        let bytes = record.to_bytes().unwrap();
        assert_eq!(bytes.len(), record.encoded_len());
        assert_eq!(decode(&bytes).unwrap(), record);
    }

    #[test]
    fn truncated_record_keeps_decoded_fields() {
        let bytes = dummy_record();
        let err = decode(&bytes[..30]).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::PrematureEnd);
        assert_eq!(err.offset, 30);

        let Record::V20(partial) = *err.partial else {
            panic!("partial record has the wrong version");
        };
        assert_eq!(partial.size_x, 192);
        assert_eq!(partial.views.len(), 1);
        assert_eq!(partial.views[0].minutiae.len(), 1);
    }

    #[test]
    fn declared_length_must_match() {
        let mut bytes = dummy_record();
        let len = bytes.len() as u32;

        bytes[8..12].copy_from_slice(&(len - 2).to_be_bytes());
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidTotalLength);

        bytes[8..12].copy_from_slice(&(len + 4).to_be_bytes());
        bytes.extend_from_slice(&[0; 4]);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, FmrErrorKind::InvalidTotalLength);
        assert_eq!(err.offset, len as usize);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = dummy_record();
        let expected = decode(&bytes).unwrap();
        bytes.extend_from_slice(b"junk");
        assert_eq!(decode(&bytes).unwrap(), expected);
    }

    #[test]
    fn field_ranges_are_checked() {
        let bytes = dummy_record();

        let mut quality = bytes.clone();
        quality[26] = 101;
        assert_eq!(decode(&quality).unwrap_err().kind, FmrErrorKind::InvalidFingerQuality);

        let mut position = bytes.clone();
        position[24] = 11;
        assert_eq!(decode(&position).unwrap_err().kind, FmrErrorKind::InvalidFingerPosition);

        let mut reserved = bytes.clone();
        reserved[23] = 1;
        assert_eq!(decode(&reserved).unwrap_err().kind, FmrErrorKind::InvalidReservedByte);

        let mut version = bytes;
        version[4..8].copy_from_slice(b"030\0");
        assert_eq!(decode(&version).unwrap_err().kind, FmrErrorKind::InvalidVersion);
    }

    #[test]
    fn encoding_rejects_oversized_fields() {
        let mut record = decode(&dummy_record()).unwrap();
        record.views[0].minutiae[0].x = 0x4000;
        assert_eq!(
            record.to_bytes(),
            Err(RecordError::FieldOutOfRange {
                field: "minutia x",
                value: 0x4000,
            })
        );

        let record = V20Record {
            views: vec![View::default(); 256],
            ..V20Record::default()
        };
        assert_eq!(record.to_bytes(), Err(RecordError::TooManyViews(256)));
    }
}
