//! Binding to native fingerprint scanner drivers.
//!
//! The native library is loaded once per process on first use. Devices are
//! opened as [`Scanner`] values which turn the hardware off again when they
//! go out of scope. Templates they produce can be parsed with [`fmr`].
//!
//! ```no_run
//! use std::time::Duration;
//!
//! # fn main() -> fpscanner::Result<()> {
//! for name in fpscanner::list()? {
//!     let mut scanner = fpscanner::Scanner::open(&name)?;
//!     if scanner.scan(Duration::from_secs(5)).is_captured() {
//!         if let Some(image) = scanner.image()? {
//!             image.save_png(format!("{}.png", name))?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod capture;
pub mod config;
pub mod conformance;
pub mod driver;
pub mod dummy;
pub mod error;
pub mod fmr;
pub mod native;
pub mod scanner;

// Re-export commonly used items
pub use caps::{Capabilities, ImageFormat, ImageSpec};
pub use capture::Image;
pub use driver::{Driver, Timeout};
pub use dummy::DummyDriver;
pub use error::{Result, ScannerError};
pub use native::NativeDriver;
pub use scanner::{ScanOutcome, Scanner};

/// Names of the scanners known to the native library.
///
/// Loads the library on first use; fails only if it cannot be loaded.
pub fn list() -> Result<Vec<String>> {
    Ok(NativeDriver::load()?.list())
}
