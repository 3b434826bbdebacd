//! Command-line front end for fingerprint scanner drivers.
//!
//! Lists scanners, prints their capabilities, captures PNG images or ISO
//! templates, and checks a driver against the scanner API contract. Minutiae
//! records can also be dumped field by field or converted to the 2005 layout
//! without touching a scanner.

mod dump;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use fpscanner::conformance;
use fpscanner::config;
use fpscanner::fmr::{self, FmrError, RecordError};
use fpscanner::{Driver, DummyDriver, NativeDriver, ScanOutcome, Scanner, ScannerError, Timeout};
use log::{error, info, LevelFilter};

use output::TemplateFormat;

/// Exit status for a scan that timed out.
const EXIT_TIMEOUT: i32 = 2;

/// Driver backends selectable from the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum DriverKind {
    /// Native scanner library found next to the executable
    Native,
    /// Built-in simulated scanner
    Dummy,
}

/// Command line interface definition
#[derive(Debug, Parser)]
#[command(
    name = "fpscan",
    version,
    about = "List fingerprint scanners, capture images or ISO templates and inspect them"
)]
struct Cli {
    /// Driver backend to use
    #[arg(long, value_enum, default_value_t = DriverKind::Native, global = true)]
    driver: DriverKind,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

/// Output format flags for templates, at most one of which may be given
#[derive(Debug, Args)]
#[group(multiple = false)]
struct FormatFlags {
    /// Raw binary output (default)
    #[arg(short = 'b', long)]
    binary: bool,
    /// Hexdump output
    #[arg(short = 'x', long)]
    hex: bool,
    /// C array output
    #[arg(short = 'c', long = "c-array")]
    c_array: bool,
}

impl FormatFlags {
    fn format(&self) -> TemplateFormat {
        match (self.binary, self.hex, self.c_array) {
            (_, true, _) => TemplateFormat::Hex,
            (_, _, true) => TemplateFormat::CArray,
            _ => TemplateFormat::Binary,
        }
    }
}

/// Available subcommands
#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Scanner(ScannerCommand),
    #[command(flatten)]
    Record(RecordCommand),
}

/// Commands that talk to a scanner through the selected driver
#[derive(Debug, Subcommand)]
enum ScannerCommand {
    /// Print the names of available scanners
    List,
    /// Print the capabilities of a scanner as JSON
    Caps {
        scanner: String,
    },
    /// Scan a finger and write the image as PNG
    Png {
        /// Name of the scanner to use
        #[arg(short, long)]
        scanner: String,
        /// Timeout in milliseconds (0 polls, -1 waits forever)
        #[arg(
            short,
            long,
            default_value_t = config::scan::DEFAULT_TIMEOUT_MS,
            allow_negative_numbers = true
        )]
        timeout: i32,
        /// Output file, stdout by default
        output: Option<PathBuf>,
    },
    /// Scan a finger and write its ISO/IEC 19794-2 template
    Iso {
        /// Name of the scanner to use
        #[arg(short, long)]
        scanner: String,
        /// Timeout in milliseconds (0 polls, -1 waits forever)
        #[arg(
            short,
            long,
            default_value_t = config::scan::DEFAULT_TIMEOUT_MS,
            allow_negative_numbers = true
        )]
        timeout: i32,
        #[command(flatten)]
        format: FormatFlags,
        /// Output file, stdout by default
        output: Option<PathBuf>,
    },
    /// Run the driver contract check against a scanner
    Test {
        scanner: String,
    },
}

/// Commands on stored ISO/IEC 19794-2 minutiae records
#[derive(Debug, Subcommand)]
enum RecordCommand {
    /// Print every field of a 2005 or 0.30 record
    Decode {
        /// Print what was read before a decoding error
        #[arg(short, long)]
        force: bool,
        /// Record file, stdin by default
        input: Option<PathBuf>,
    },
    /// Convert a 0.30 record to the 2005 layout
    Convert {
        /// Record file, stdin by default
        input: Option<PathBuf>,
        /// Output file, stdout by default
        output: Option<PathBuf>,
    },
}

/// Why a command failed
#[derive(Debug)]
enum Failure {
    Timeout,
    Error(String),
}

impl From<ScannerError> for Failure {
    fn from(e: ScannerError) -> Self {
        Failure::Error(e.to_string())
    }
}

impl From<io::Error> for Failure {
    fn from(e: io::Error) -> Self {
        Failure::Error(format!("Failed to write: {}", e))
    }
}

impl From<FmrError> for Failure {
    fn from(e: FmrError) -> Self {
        Failure::Error(format!("Failed to decode record: {}", e))
    }
}

impl From<RecordError> for Failure {
    fn from(e: RecordError) -> Self {
        Failure::Error(format!("Failed to convert record: {}", e))
    }
}

/// Reads the whole input file, or stdin when no path is given
fn read_input(path: Option<&Path>) -> Result<Vec<u8>, Failure> {
    let mut data = Vec::new();
    let result = match path {
        Some(path) => File::open(path).and_then(|mut f| f.read_to_end(&mut data)),
        None => io::stdin().lock().read_to_end(&mut data),
    };
    match result {
        Ok(_) => Ok(data),
        Err(e) => Err(Failure::Error(match path {
            Some(path) => format!("Failed to read {}: {}", path.display(), e),
            None => format!("Failed to read stdin: {}", e),
        })),
    }
}

/// Opens the output file, or stdout when no path is given
fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Performs a single scan, mapping non-captures to failures
fn scan_once<D: Driver>(scanner: &mut Scanner<D>, timeout_ms: i32) -> Result<(), Failure> {
    match scanner.scan(Timeout::from_millis(timeout_ms)) {
        ScanOutcome::Captured => Ok(()),
        ScanOutcome::TimedOut => Err(Failure::Timeout),
        ScanOutcome::Failed(code) => {
            Err(Failure::Error(format!("Error when scanning! ({})", code)))
        }
    }
}

fn list_scanners<D: Driver>(driver: &D) -> Result<(), Failure> {
    let names = driver.list();
    if names.is_empty() {
        info!("No scanners available");
    }
    let mut out = io::stdout().lock();
    for name in names {
        writeln!(out, "{}", name)?;
    }
    Ok(())
}

fn print_caps<D: Driver>(driver: Arc<D>, name: &str) -> Result<(), Failure> {
    let scanner = Scanner::with_driver(driver, name)?;
    let json = serde_json::to_string_pretty(scanner.capabilities())
        .map_err(|e| Failure::Error(format!("Failed to describe capabilities: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn capture_png<D: Driver>(
    driver: Arc<D>,
    name: &str,
    timeout_ms: i32,
    dest: Option<&Path>,
) -> Result<(), Failure> {
    let mut scanner = Scanner::with_driver(driver, name)?;
    if !scanner.capabilities().provides_image() {
        return Err(Failure::Error("Scanner provides no images!".to_string()));
    }

    scan_once(&mut scanner, timeout_ms)?;

    let image = scanner
        .image()?
        .ok_or_else(|| Failure::Error("No image returned!".to_string()))?;
    let out = open_output(dest)?;
    image.write_png(out)?;
    info!("Wrote {}x{} {} image", image.width, image.height, image.format);
    Ok(())
}

fn capture_iso<D: Driver>(
    driver: Arc<D>,
    name: &str,
    timeout_ms: i32,
    format: TemplateFormat,
    dest: Option<&Path>,
) -> Result<(), Failure> {
    let mut scanner = Scanner::with_driver(driver, name)?;
    if !scanner.capabilities().provides_iso_template() {
        return Err(Failure::Error("Scanner provides no ISO templates!".to_string()));
    }

    scan_once(&mut scanner, timeout_ms)?;

    let template = scanner
        .iso_template()?
        .ok_or_else(|| Failure::Error("No template returned!".to_string()))?;
    let mut out = open_output(dest)?;
    output::write_template(format, &template, &mut out)?;
    info!("Wrote {} byte ISO template", template.len());
    Ok(())
}

fn run_check<D: Driver>(driver: Arc<D>, name: &str) -> Result<(), Failure> {
    let report = conformance::check(driver, name)?;
    println!("Scanner '{}' passed", name);
    if let (Some(spec), Some(size)) = (report.caps.image, report.image_size) {
        println!(
            "  image: {} {}x{} ({} bytes)",
            spec.format, spec.width, spec.height, size
        );
    }
    if let Some(size) = report.iso_template_size {
        println!("  ISO template: {} bytes", size);
    }
    Ok(())
}

/// Dumps a record, or with `force` whatever was read before it went bad
fn decode_record<W: Write>(data: &[u8], force: bool, out: &mut W) -> Result<(), Failure> {
    match fmr::decode(data) {
        Ok(record) => dump::write_record(&record, out)?,
        Err(e) => {
            if force {
                dump::write_record(&e.partial, out)?;
                out.flush()?;
            }
            return Err(e.into());
        }
    }
    out.flush()?;
    Ok(())
}

fn convert_record(data: &[u8]) -> Result<Vec<u8>, Failure> {
    let record = fmr::v030::decode(data)?;
    let converted = record.to_v20()?;
    info!("Converted {} representation(s) to the 2005 layout", converted.views.len());
    Ok(converted.to_bytes()?)
}

/// Dispatches a command against the chosen driver
fn run<D: Driver>(driver: Arc<D>, cmd: ScannerCommand) -> Result<(), Failure> {
    match cmd {
        ScannerCommand::List => list_scanners(driver.as_ref()),
        ScannerCommand::Caps { scanner } => print_caps(driver, &scanner),
        ScannerCommand::Png {
            scanner,
            timeout,
            output,
        } => capture_png(driver, &scanner, timeout, output.as_deref()),
        ScannerCommand::Iso {
            scanner,
            timeout,
            format,
            output,
        } => capture_iso(driver, &scanner, timeout, format.format(), output.as_deref()),
        ScannerCommand::Test { scanner } => run_check(driver, &scanner),
    }
}

/// Runs a record command, no driver needed
fn run_record(cmd: RecordCommand) -> Result<(), Failure> {
    match cmd {
        RecordCommand::Decode { force, input } => {
            let data = read_input(input.as_deref())?;
            decode_record(&data, force, &mut io::stdout().lock())
        }
        RecordCommand::Convert { input, output } => {
            let data = read_input(input.as_deref())?;
            let converted = convert_record(&data)?;
            let mut out = open_output(output.as_deref())?;
            out.write_all(&converted)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(log_level(cli.verbose))
        .env()
        .init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match (cli.cmd, cli.driver) {
        (Command::Record(cmd), _) => run_record(cmd),
        (Command::Scanner(cmd), DriverKind::Native) => match NativeDriver::load() {
            Ok(driver) => {
                info!("Using native library at {}", driver.library_path().display());
                run(Arc::new(driver), cmd)
            }
            Err(e) => Err(Failure::from(e)),
        },
        (Command::Scanner(cmd), DriverKind::Dummy) => run(Arc::new(DummyDriver::new()), cmd),
    };

    match result {
        Ok(()) => {}
        Err(Failure::Timeout) => {
            error!("Timeout when scanning...");
            std::process::exit(EXIT_TIMEOUT);
        }
        Err(Failure::Error(msg)) => {
            error!("{}", msg);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn iso_flags_select_format() {
        let cli = Cli::try_parse_from(["fpscan", "iso", "-s", "Dummy", "-x"]).unwrap();
        match cli.cmd {
            Command::Scanner(ScannerCommand::Iso { format, timeout, .. }) => {
                assert_eq!(format.format(), TemplateFormat::Hex);
                assert_eq!(timeout, -1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn iso_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["fpscan", "iso", "-s", "Dummy", "-x", "-c"]).is_err());
    }

    #[test]
    fn png_accepts_negative_timeout_and_output() {
        let cli = Cli::try_parse_from([
            "fpscan", "--driver", "dummy", "png", "-s", "Dummy", "-t", "-1", "out.png",
        ])
        .unwrap();
        assert_eq!(cli.driver, DriverKind::Dummy);
        match cli.cmd {
            Command::Scanner(ScannerCommand::Png {
                scanner,
                timeout,
                output,
            }) => {
                assert_eq!(scanner, "Dummy");
                assert_eq!(timeout, -1);
                assert_eq!(output, Some(PathBuf::from("out.png")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(log_level(0), LevelFilter::Warn);
        assert_eq!(log_level(1), LevelFilter::Info);
        assert_eq!(log_level(3), LevelFilter::Debug);
    }

    #[test]
    fn dummy_capture_writes_png() {
        let dir = std::env::temp_dir().join(format!("fpscan-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("finger.png");

        capture_png(Arc::new(DummyDriver::new()), "Dummy", 1000, Some(&path)).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_template_support_fails() {
        let driver = Arc::new(DummyDriver::new().without_iso_template());
        let err = capture_iso(driver, "Dummy", 0, TemplateFormat::Binary, None).unwrap_err();
        assert!(matches!(err, Failure::Error(ref msg) if msg.contains("no ISO templates")));
    }

    #[test]
    fn record_commands_parse() {
        let cli = Cli::try_parse_from(["fpscan", "decode", "-f", "finger.iso"]).unwrap();
        match cli.cmd {
            Command::Record(RecordCommand::Decode { force, input }) => {
                assert!(force);
                assert_eq!(input, Some(PathBuf::from("finger.iso")));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["fpscan", "convert"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Command::Record(RecordCommand::Convert {
                input: None,
                output: None,
            })
        ));
    }

    fn dummy_template() -> Vec<u8> {
        static CAPTURES: AtomicUsize = AtomicUsize::new(0);
        let n = CAPTURES.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("fpscan-iso-{}-{}", std::process::id(), n));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("finger.iso");

        let driver = Arc::new(DummyDriver::new());
        capture_iso(driver, "Dummy", 1000, TemplateFormat::Binary, Some(&path)).unwrap();
        let data = read_input(Some(&path)).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        data
    }

    #[test]
    fn decodes_captured_template() {
        let mut out = Vec::new();
        decode_record(&dummy_template(), false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Version: 0x20323000 ( 20)\n"));
        assert!(text.contains("Number of finger views: 1\n"));
        assert!(text.contains("\tNumber of minutiae: 6\n"));
        assert!(text.contains("\n\tMinutia 5:\n"));
    }

    #[test]
    fn forced_decode_dumps_partial_record() {
        let template = dummy_template();
        let truncated = &template[..30];

        let mut out = Vec::new();
        let err = decode_record(truncated, false, &mut out).unwrap_err();
        assert!(matches!(err, Failure::Error(ref msg) if msg.contains("at byte 30")));
        assert!(out.is_empty());

        decode_record(truncated, true, &mut out).unwrap_err();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\nView 0:\n"));
        assert!(text.contains("\tMinutia 0:\n"));
        assert!(!text.contains("Minutia 1:"));
    }

    /// One right thumb representation with a single termination.
    const V030_RECORD: [u8; 54] = [
        b'F', b'M', b'R', 0, b'0', b'3', b'0', 0, 0, 0, 0, 54, 0, 1, 0, // header
        0, 0, 0, 39, 0x07, 0xdb, 5, 17, 12, 30, 0, 0, 250, // length, capture time
        14, 0x12, 0x34, 0, 1, 0, // device, no quality blocks
        1, 0, 0, 197, 0, 197, 0, 1, 0, 1, 0x68, // finger, rates, impression, size
        0x51, 1, 0x40, 40, 0, 50, 10, 0, 0, // minutiae, no extended data
    ];

    #[test]
    fn converts_draft_record() {
        let converted = convert_record(&V030_RECORD).unwrap();
        let record = fmr::v20::decode(&converted).unwrap();
        assert_eq!((record.size_x, record.size_y), (256, 360));
        assert_eq!(record.views.len(), 1);
        assert_eq!(record.views[0].finger_position, 1);

        let minutia = record.views[0].minutiae[0];
        assert_eq!(minutia.kind, fmr::MinutiaType::Termination);
        assert_eq!((minutia.x, minutia.y, minutia.angle), (40, 50, 10));

        let mut out = Vec::new();
        decode_record(&V030_RECORD, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Capture date and time: 2011-05-17 12:30:00.250\n"));
        assert!(text.contains("Capture device technology ID: 14 (semiconductor capacitive)\n"));
    }

    #[test]
    fn convert_rejects_2005_input() {
        let err = convert_record(&dummy_template()).unwrap_err();
        assert!(matches!(err, Failure::Error(ref msg) if msg.contains("Failed to decode")));
    }

    #[test]
    fn slow_scan_maps_to_timeout() {
        let driver = Arc::new(
            DummyDriver::new().with_scan_delay(std::time::Duration::from_millis(100)),
        );
        let mut scanner = Scanner::with_driver(driver, "Dummy").unwrap();
        assert!(matches!(scan_once(&mut scanner, 0), Err(Failure::Timeout)));
    }
}
