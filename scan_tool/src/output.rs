//! Output encodings for captured ISO templates.

use std::io::{self, Write};

/// How a template is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Binary,
    Hex,
    CArray,
}

/// Write `data` to `out` in the requested format.
pub fn write_template<W: Write>(
    format: TemplateFormat,
    data: &[u8],
    out: &mut W,
) -> io::Result<()> {
    match format {
        TemplateFormat::Binary => out.write_all(data)?,
        TemplateFormat::Hex => hexdump(data, "", out)?,
        TemplateFormat::CArray => c_array(data, out)?,
    }
    out.flush()
}

/// Offset, 16 hex bytes and an ASCII column per line, each line led by `prefix`.
pub fn hexdump<W: Write>(data: &[u8], prefix: &str, out: &mut W) -> io::Result<()> {
    for (row, chunk) in data.chunks(16).enumerate() {
        write!(out, "{}{:08x}  ", prefix, row * 16)?;
        for byte in chunk {
            write!(out, "{:02x} ", byte)?;
        }
        for _ in chunk.len()..16 {
            write!(out, "   ")?;
        }
        let ascii: String = chunk
            .iter()
            .map(|&c| if c == b' ' || c.is_ascii_graphic() { c as char } else { '.' })
            .collect();
        writeln!(out, " {:<16}", ascii)?;
    }
    Ok(())
}

/// C source declaring the template as `iso_template` with its size.
pub fn c_array<W: Write>(data: &[u8], out: &mut W) -> io::Result<()> {
    const COLUMNS: usize = 8;

    writeln!(out, "unsigned char iso_template[] = {{")?;
    for row in data.chunks(COLUMNS) {
        let line: Vec<String> = row.iter().map(|b| format!("0x{:02x},", b)).collect();
        writeln!(out, "\t{}", line.join(" "))?;
    }
    writeln!(out, "}};")?;
    writeln!(out, "int iso_template_size = {};", data.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: TemplateFormat, data: &[u8]) -> String {
        let mut out = Vec::new();
        write_template(format, data, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn binary_is_untouched() {
        let mut out = Vec::new();
        write_template(TemplateFormat::Binary, &[0, 1, 0xff], &mut out).unwrap();
        assert_eq!(out, vec![0, 1, 0xff]);
    }

    #[test]
    fn hexdump_pads_last_row() {
        let data: Vec<u8> = b"FMR\0 20\0".iter().copied().chain(0x40..0x4a).collect();
        let text = render(TemplateFormat::Hex, &data);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "00000000  46 4d 52 00 20 32 30 00 40 41 42 43 44 45 46 47  FMR. 20.@ABCDEFG"
        );
        assert!(lines[1].starts_with("00000010  48 49 "));
        assert_eq!(lines[0].len(), lines[1].len());
    }

    #[test]
    fn hexdump_prefixes_every_line() {
        let data: Vec<u8> = (0..20).collect();
        let mut out = Vec::new();
        hexdump(&data, "\t\t", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|line| line.starts_with("\t\t000000")));
    }

    #[test]
    fn c_array_rows_of_eight() {
        let data: Vec<u8> = (0..9).collect();
        let text = render(TemplateFormat::CArray, &data);
        assert_eq!(
            text,
            "unsigned char iso_template[] = {\n\
             \t0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,\n\
             \t0x08,\n\
             };\n\
             int iso_template_size = 9;\n"
        );
    }
}
