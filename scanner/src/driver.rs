//! Contract every scanner driver backend satisfies.
//!
//! Methods mirror the C scanner API one to one, including its integer status
//! codes, so the native binding stays a thin forwarding layer. Interpretation
//! of those codes happens in [`Scanner`](crate::Scanner).

use std::time::Duration;

use crate::caps::Capabilities;

/// Status returned by `scan` on success.
pub const SCAN_OK: i32 = 0;

/// Status returned by `scan` when the timeout elapsed.
pub const SCAN_TIMEOUT: i32 = -1;

/// How long a scan may wait for a finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Only check whether a scan is already available.
    Poll,
    /// Wait until a scan is ready.
    Infinite,
    After(Duration),
}

impl Timeout {
    /// Milliseconds as the C API expects them: 0 polls, -1 waits forever.
    ///
    /// Partial milliseconds round up so a short wait never turns into a poll.
    pub fn as_millis(self) -> i32 {
        match self {
            Timeout::Poll => 0,
            Timeout::Infinite => -1,
            Timeout::After(d) => {
                i32::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX)
            }
        }
    }

    /// Inverse of [`Timeout::as_millis`]; any negative value waits forever.
    pub fn from_millis(ms: i32) -> Self {
        match ms {
            0 => Timeout::Poll,
            ms if ms < 0 => Timeout::Infinite,
            ms => Timeout::After(Duration::from_millis(ms as u64)),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::Poll
        } else {
            Timeout::After(d)
        }
    }
}

/// A scanner driver backend.
///
/// Handles are claimed with [`Driver::get`] and must be returned with
/// [`Driver::put`]. Every other method requires a claimed handle; all but
/// `on` additionally require it to be turned on.
pub trait Driver: Send + Sync + 'static {
    /// Opaque token for one claimed device.
    type Handle: Send + Sync + 'static;

    /// Names of all registered devices, claimed or not.
    fn list(&self) -> Vec<String>;

    /// Claim a device by name. `None` if unknown or already claimed.
    fn get(&self, name: &str) -> Option<Self::Handle>;

    fn put(&self, handle: Self::Handle);

    /// Turn the device on. The error carries the driver's status code.
    fn on(&self, handle: &Self::Handle) -> Result<(), i32>;

    fn off(&self, handle: &Self::Handle);

    fn caps(&self, handle: &Self::Handle) -> Result<Capabilities, i32>;

    /// Perform a single blocking scan.
    ///
    /// Returns [`SCAN_OK`], [`SCAN_TIMEOUT`] or another negative error code.
    fn scan(&self, handle: &Self::Handle, timeout: Timeout) -> i32;

    /// Copy the most recent image into `buffer`, never past its end.
    ///
    /// Returns the full image size, which may exceed `buffer.len()`, or a
    /// negative error code. An empty buffer queries the size.
    fn image(&self, handle: &Self::Handle, buffer: &mut [u8]) -> i32;

    /// Same protocol as [`Driver::image`] for the ISO/IEC 19794-2 template.
    fn iso_template(&self, handle: &Self::Handle, buffer: &mut [u8]) -> i32;
}
