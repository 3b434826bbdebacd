//! Field-by-field listing of decoded minutiae records.

use std::io::{self, Write};

use fpscanner::fmr::{self, v030, v20, Minutia, Record, V030Record, V20Record};

use crate::output::hexdump;

pub fn write_record<W: Write>(record: &Record, out: &mut W) -> io::Result<()> {
    match record {
        Record::V20(record) => write_v20(record, out),
        Record::V030(record) => write_v030(record, out),
    }
}

/// A header word with its printable characters, e.g. `0x464d5200 (FMR)`.
fn tag(value: u32) -> String {
    let text: String = value
        .to_be_bytes()
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect();
    format!("0x{:08x} ({})", value, text)
}

fn name(value: Option<&str>) -> &str {
    value.unwrap_or("undefined")
}

fn write_minutia<W: Write>(index: usize, m: &Minutia, out: &mut W) -> io::Result<()> {
    writeln!(out, "\n\tMinutia {}:", index)?;
    writeln!(out, "\t\tType: {} ({})", m.kind.bits(), m.kind.as_str())?;
    writeln!(out, "\t\tX: {}", m.x)?;
    writeln!(out, "\t\tY: {}", m.y)?;
    writeln!(
        out,
        "\t\tAngle: {} (* {} deg = {:.5} deg)",
        m.angle,
        fmr::ANGLE_STEP_DEGREES,
        m.angle_degrees()
    )
}

fn write_extended_data<W: Write>(data: &[u8], out: &mut W) -> io::Result<()> {
    writeln!(out, "\n\tExtended data block length: {} bytes", data.len())?;
    if !data.is_empty() {
        writeln!(out, "\tExtended data block:")?;
        hexdump(data, "\t\t", out)?;
    }
    Ok(())
}

fn write_v20<W: Write>(record: &V20Record, out: &mut W) -> io::Result<()> {
    writeln!(out, "Format identifier: {}", tag(fmr::FORMAT_ID))?;
    writeln!(out, "Version: {}", tag(v20::VERSION))?;
    writeln!(out, "Total length: {} bytes", record.encoded_len())?;
    writeln!(
        out,
        "Capture equipment certification: {}",
        record.capture_equipment_certification
    )?;
    writeln!(out, "Capture device type ID: {}", record.capture_device_type)?;
    writeln!(out, "Image size in X: {} (pixels)", record.size_x)?;
    writeln!(out, "Image size in Y: {} (pixels)", record.size_y)?;
    writeln!(out, "Horizontal (X) resolution: {} (pixels per cm)", record.resolution_x)?;
    writeln!(out, "Vertical (Y) resolution: {} (pixels per cm)", record.resolution_y)?;
    writeln!(out, "Number of finger views: {}", record.views.len())?;

    for (i, view) in record.views.iter().enumerate() {
        writeln!(out, "\nView {}:", i)?;
        writeln!(
            out,
            "\tFinger position: {} ({})",
            view.finger_position,
            name(v20::finger_position_name(view.finger_position))
        )?;
        writeln!(out, "\tRepresentation number: {}", view.representation_number)?;
        writeln!(
            out,
            "\tImpression type: {} ({})",
            view.impression_type,
            name(v20::impression_type_name(view.impression_type))
        )?;
        writeln!(out, "\tFinger quality: {}", view.finger_quality)?;
        writeln!(out, "\tNumber of minutiae: {}", view.minutiae.len())?;

        for (j, minutia) in view.minutiae.iter().enumerate() {
            write_minutia(j, minutia, out)?;
            match minutia.quality {
                0 => writeln!(out, "\t\tQuality: not reported")?,
                q => writeln!(out, "\t\tQuality: {}", q)?,
            }
        }

        write_extended_data(&view.extended_data, out)?;
    }
    Ok(())
}

fn write_v030<W: Write>(record: &V030Record, out: &mut W) -> io::Result<()> {
    writeln!(out, "Format identifier: {}", tag(fmr::FORMAT_ID))?;
    writeln!(out, "Version: {}", tag(v030::VERSION))?;
    writeln!(out, "Total length: {} bytes", record.total_length)?;
    writeln!(
        out,
        "Number of finger representations: {}",
        record.representations.len()
    )?;
    writeln!(
        out,
        "Device certification block: {}",
        if record.device_certification { "present" } else { "not present" }
    )?;

    for (i, repr) in record.representations.iter().enumerate() {
        let t = &repr.capture_time;
        writeln!(out, "\nRepresentation {}:", i)?;
        writeln!(out, "\tRepresentation length: {} bytes", repr.length)?;
        writeln!(
            out,
            "\tCapture date and time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            t.year, t.month, t.day, t.hour, t.minute, t.second, t.millisecond
        )?;
        writeln!(
            out,
            "\tCapture device technology ID: {} ({})",
            repr.device_technology,
            name(v030::device_technology_name(repr.device_technology))
        )?;
        writeln!(out, "\tCapture device vendor ID: 0x{:04x}", repr.device_vendor)?;
        writeln!(out, "\tCapture device type ID: 0x{:04x}", repr.device_type)?;

        writeln!(out, "\tNumber of quality blocks: {}", repr.quality_blocks.len())?;
        for (b, block) in repr.quality_blocks.iter().enumerate() {
            writeln!(out, "\n\tQuality block {}:", b)?;
            if block.value == v030::QUALITY_FAILED {
                writeln!(out, "\t\tQuality value: {} (failed to calculate)", block.value)?;
            } else {
                writeln!(out, "\t\tQuality value: {}", block.value)?;
            }
            writeln!(out, "\t\tQuality vendor ID: 0x{:04x}", block.vendor)?;
            writeln!(out, "\t\tQuality algorithm ID: 0x{:04x}", block.algorithm)?;
        }

        if record.device_certification {
            writeln!(
                out,
                "\tNumber of certification blocks: {}",
                repr.certification_blocks.len()
            )?;
            for (b, block) in repr.certification_blocks.iter().enumerate() {
                writeln!(out, "\n\tCertification block {}:", b)?;
                writeln!(out, "\t\tCertification authority ID: 0x{:04x}", block.authority)?;
                writeln!(out, "\t\tCertification scheme ID: 0x{:02x}", block.scheme)?;
            }
        }

        writeln!(
            out,
            "\tFinger position: {} ({})",
            repr.finger_position,
            name(v030::finger_position_name(repr.finger_position))
        )?;
        writeln!(out, "\tRepresentation number: {}", repr.representation_number)?;
        writeln!(
            out,
            "\tHorizontal image spatial sampling rate: {} (pixels per cm)",
            repr.sampling_rate_x
        )?;
        writeln!(
            out,
            "\tVertical image spatial sampling rate: {} (pixels per cm)",
            repr.sampling_rate_y
        )?;
        writeln!(
            out,
            "\tImpression type: {} ({})",
            repr.impression_type,
            name(v030::impression_type_name(repr.impression_type))
        )?;
        writeln!(out, "\tSize of scanned image in X direction: {} (pixels)", repr.size_x)?;
        writeln!(out, "\tSize of scanned image in Y direction: {} (pixels)", repr.size_y)?;
        writeln!(out, "\tMinutia field length: {} (bytes)", repr.minutia_field_length)?;
        writeln!(
            out,
            "\tRidge ending type: {} ({})",
            repr.ridge_ending_type,
            name(v030::ridge_ending_type_name(repr.ridge_ending_type))
        )?;
        writeln!(out, "\tNumber of minutiae: {}", repr.minutiae.len())?;

        for (j, minutia) in repr.minutiae.iter().enumerate() {
            write_minutia(j, minutia, out)?;
            if !repr.has_minutia_quality() {
                continue;
            }
            match minutia.quality {
                v030::MINUTIA_QUALITY_NOT_REPORTED => {
                    writeln!(out, "\t\tQuality: {} (not reported)", minutia.quality)?
                }
                v030::MINUTIA_QUALITY_FAILED => {
                    writeln!(out, "\t\tQuality: {} (failed to compute)", minutia.quality)?
                }
                q => writeln!(out, "\t\tQuality: {}", q)?,
            }
        }

        write_extended_data(&repr.extended_data, out)?;
    }
    Ok(())
}
