//! Exercise a driver against the buffer and lifecycle contract.
//!
//! Runs the same sequence a driver author would run by hand: open, scan,
//! then exercise each payload with a size query, a half-sized fetch and a
//! full fetch against a known fill pattern.

use std::sync::Arc;

use log::info;

use crate::caps::Capabilities;
use crate::driver::{Driver, Timeout};
use crate::error::{Result, ScannerError};
use crate::scanner::{ScanOutcome, Scanner};

/// What a successful check observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub caps: Capabilities,
    pub image_size: Option<usize>,
    pub iso_template_size: Option<usize>,
}

fn fail(message: String) -> ScannerError {
    ScannerError::Conformance(message)
}

/// Check one device of `driver`. Waits for a finger on real hardware.
pub fn check<D: Driver>(driver: Arc<D>, name: &str) -> Result<Report> {
    let mut scanner = Scanner::with_driver(driver, name)?;
    let caps = scanner.capabilities().clone();
    if let Some(issue) = &caps.image_issue {
        return Err(fail(format!("unusable image descriptor: {}", issue)));
    }

    info!("Scanning... give the scanner a finger now");
    match scanner.scan(Timeout::Infinite) {
        ScanOutcome::Captured => {}
        other => return Err(fail(format!("scan returned {:?}", other))),
    }

    let image_size = match caps.image {
        Some(spec) => {
            info!(
                "Checking {} image {}x{}",
                spec.format, spec.width, spec.height
            );
            if spec.width == 0 || spec.height == 0 {
                return Err(fail(format!(
                    "image geometry {}x{} is empty",
                    spec.width, spec.height
                )));
            }
            let size = scanner.with_raw(|d, h| check_payload("image", |buf| d.image(h, buf)))?;
            if size != spec.byte_len() {
                return Err(fail(format!(
                    "image is {} bytes, {}x{} needs {}",
                    size,
                    spec.width,
                    spec.height,
                    spec.byte_len()
                )));
            }
            Some(size)
        }
        None => None,
    };

    let iso_template_size = if caps.iso_template {
        info!("Checking ISO template");
        Some(scanner.with_raw(|d, h| {
            check_payload("ISO template", |buf| d.iso_template(h, buf))
        })?)
    } else {
        None
    };

    scanner.release();
    info!("Driver check for '{}' passed", name);

    Ok(Report {
        caps,
        image_size,
        iso_template_size,
    })
}

/// Check one payload through `fill`, returning its size.
fn check_payload<F>(what: &str, mut fill: F) -> Result<usize>
where
    F: FnMut(&mut [u8]) -> i32,
{
    let size = fill(&mut [][..]);
    if size <= 0 {
        return Err(fail(format!("{} size query returned {}", what, size)));
    }
    let size = size as usize;

    let pattern: Vec<u8> = (0..size).map(|i| (i & 0xff) as u8).collect();
    let mut buffer = pattern.clone();
    let half = size / 2;

    let reported = fill(&mut buffer[..half]);
    if reported < 0 || reported as usize != size {
        return Err(fail(format!(
            "half-buffer {} fetch returned {}, expected {}",
            what, reported, size
        )));
    }
    if half > 0 && buffer[..half] == pattern[..half] {
        return Err(fail(format!("half-buffer {} fetch wrote nothing", what)));
    }
    if buffer[half..] != pattern[half..] {
        return Err(fail(format!(
            "half-buffer {} fetch wrote past the buffer",
            what
        )));
    }

    buffer.copy_from_slice(&pattern);
    let reported = fill(&mut buffer);
    if reported < 0 || reported as usize != size {
        return Err(fail(format!(
            "full {} fetch returned {}, expected {}",
            what, reported, size
        )));
    }
    if buffer == pattern {
        return Err(fail(format!("full {} fetch wrote nothing", what)));
    }

    Ok(size)
}
