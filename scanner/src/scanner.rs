//! RAII wrapper around one claimed, powered-on scanner.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};

use crate::caps::Capabilities;
use crate::capture::Image;
use crate::driver::{Driver, Timeout, SCAN_OK, SCAN_TIMEOUT};
use crate::error::{Result, ScannerError};
use crate::native::NativeDriver;

/// Result of a single scan, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A finger was scanned; image and template reflect it.
    Captured,
    TimedOut,
    /// Driver error code.
    Failed(i32),
}

impl ScanOutcome {
    pub fn from_status(status: i32) -> Self {
        match status {
            SCAN_OK => ScanOutcome::Captured,
            SCAN_TIMEOUT => ScanOutcome::TimedOut,
            code => ScanOutcome::Failed(code),
        }
    }

    pub fn is_captured(self) -> bool {
        self == ScanOutcome::Captured
    }
}

/// Claimed handle plus the bookkeeping needed to give it back.
///
/// Shared with in-flight scan workers; dropped when the last owner is gone,
/// which turns the device off and returns it to the driver.
struct Device<D: Driver> {
    driver: Arc<D>,
    name: String,
    /// Serializes driver calls on this handle. `None` only while dropping.
    handle: Mutex<Option<D::Handle>>,
    active: bool,
}

impl<D: Driver> Device<D> {
    fn with_handle<R>(&self, f: impl FnOnce(&D, &D::Handle) -> R) -> R {
        let guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = guard.as_ref().expect("scanner handle used after release");
        f(&self.driver, handle)
    }

    fn scan(&self, timeout: Timeout) -> ScanOutcome {
        debug!("Scanning on '{}' with timeout {:?}", self.name, timeout);
        let outcome = ScanOutcome::from_status(self.with_handle(|d, h| d.scan(h, timeout)));
        match outcome {
            ScanOutcome::Captured => info!("Scan completed on '{}'", self.name),
            ScanOutcome::TimedOut => info!("Scan timed out on '{}'", self.name),
            ScanOutcome::Failed(code) => warn!("Scan failed on '{}' ({})", self.name, code),
        }
        outcome
    }

    /// Size query, then a fetch into an exactly sized buffer.
    fn fetch<F>(&self, what: &'static str, fill: F) -> Result<Vec<u8>>
    where
        F: Fn(&D, &D::Handle, &mut [u8]) -> i32,
    {
        self.with_handle(|driver, handle| {
            let size = fill(driver, handle, &mut []);
            if size <= 0 {
                error!("Failed to check {} size on '{}' ({})", what, self.name, size);
                return Err(ScannerError::Fetch { what, code: size });
            }

            let mut buffer = vec![0u8; size as usize];
            let fetched = fill(driver, handle, &mut buffer);
            if fetched != size {
                error!(
                    "Failed to get {} on '{}': expected {} bytes, driver returned {}",
                    what, self.name, size, fetched
                );
                return Err(ScannerError::Fetch {
                    what,
                    code: fetched,
                });
            }

            debug!("Fetched {} bytes of {} from '{}'", size, what, self.name);
            Ok(buffer)
        })
    }
}

impl<D: Driver> Drop for Device<D> {
    fn drop(&mut self) {
        let handle = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if self.active {
                info!("Turning off scanner '{}'", self.name);
                self.driver.off(&handle);
            }
            self.driver.put(handle);
            debug!("Returned scanner '{}' to driver", self.name);
        }
    }
}

/// An open scanner: claimed, turned on, with capabilities cached.
///
/// Dropping the value (or calling [`Scanner::release`]) turns the device off
/// and returns it to the driver, on every exit path including unwinding.
///
/// Operations take `&mut self`; sharing one scanner between threads requires
/// the caller to serialize access.
pub struct Scanner<D: Driver = NativeDriver> {
    device: Arc<Device<D>>,
    caps: Capabilities,
}

impl<D: Driver> fmt::Debug for Scanner<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("name", &self.device.name)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

impl Scanner<NativeDriver> {
    /// Open a device of the native scanner library, loading it if needed.
    pub fn open(name: &str) -> Result<Self> {
        let driver = NativeDriver::load()?;
        Self::with_driver(Arc::new(driver), name)
    }
}

impl<D: Driver> Scanner<D> {
    /// Claim `name`, turn it on and fetch its capabilities.
    ///
    /// On failure nothing stays claimed or turned on.
    pub fn with_driver(driver: Arc<D>, name: &str) -> Result<Self> {
        info!("Opening scanner '{}'", name);

        let handle = driver.get(name).ok_or_else(|| {
            warn!("Scanner '{}' not found or already in use", name);
            ScannerError::DeviceNotFound(name.to_string())
        })?;

        let mut device = Device {
            driver,
            name: name.to_string(),
            handle: Mutex::new(Some(handle)),
            active: false,
        };

        if let Err(code) = device.with_handle(|d, h| d.on(h)) {
            error!("Failed to turn on scanner '{}' ({})", name, code);
            return Err(ScannerError::Open {
                name: name.to_string(),
                code,
            });
        }
        device.active = true;

        let caps = device.with_handle(|d, h| d.caps(h)).map_err(|code| {
            error!("Failed to obtain capabilities of '{}' ({})", name, code);
            ScannerError::Capabilities {
                name: name.to_string(),
                code,
            }
        })?;

        info!(
            "Scanner '{}' ready (image: {}, ISO template: {})",
            name,
            caps.image
                .map(|spec| format!("{} {}x{}", spec.format, spec.width, spec.height))
                .unwrap_or_else(|| "no".to_string()),
            if caps.iso_template { "yes" } else { "no" }
        );

        Ok(Self {
            device: Arc::new(device),
            caps,
        })
    }

    /// Device name this scanner was opened with.
    pub fn name(&self) -> &str {
        &self.device.name
    }

    /// Capabilities fetched when the scanner was opened.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Block until a finger is scanned or `timeout` elapses.
    pub fn scan(&mut self, timeout: impl Into<Timeout>) -> ScanOutcome {
        self.device.scan(timeout.into())
    }

    /// Scan on a blocking worker thread without stalling the async runtime.
    ///
    /// If the returned future is dropped the worker is abandoned: it runs
    /// until the driver returns (bounded by `timeout`), and later calls on
    /// this scanner as well as the final turn-off wait for it.
    pub async fn scan_async(&mut self, timeout: impl Into<Timeout>) -> ScanOutcome {
        let device = Arc::clone(&self.device);
        let timeout = timeout.into();
        match tokio::task::spawn_blocking(move || device.scan(timeout)).await {
            Ok(outcome) => outcome,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    /// Image of the most recent scan, or `None` if the scanner provides none.
    pub fn image(&mut self) -> Result<Option<Image>> {
        let Some(spec) = self.caps.image else {
            return Ok(None);
        };
        let data = self.device.fetch("image", D::image)?;
        if data.len() != spec.byte_len() {
            warn!(
                "Image from '{}' is {} bytes, {}x{} expects {}",
                self.device.name,
                data.len(),
                spec.width,
                spec.height,
                spec.byte_len()
            );
        }
        Ok(Some(Image::new(spec, data)))
    }

    /// ISO/IEC 19794-2 template of the most recent scan, or `None` if the
    /// scanner provides none.
    pub fn iso_template(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.caps.iso_template {
            return Ok(None);
        }
        self.device.fetch("ISO template", D::iso_template).map(Some)
    }

    /// Direct driver access for the conformance check.
    pub(crate) fn with_raw<R>(&mut self, f: impl FnOnce(&D, &D::Handle) -> R) -> R {
        self.device.with_handle(f)
    }

    /// Turn the device off and return it to the driver.
    ///
    /// Equivalent to dropping the scanner.
    pub fn release(self) {
        if Arc::strong_count(&self.device) > 1 {
            info!(
                "Scanner '{}' released while a scan is running; turning off once it returns",
                self.device.name
            );
        }
    }
}
