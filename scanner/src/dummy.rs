//! In-process driver that behaves like a real scanner without hardware.
//!
//! Every scan succeeds and yields the same synthetic ridge image and ISO
//! template. Used by the test suite and by `fpscan --driver dummy`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::caps::{Capabilities, ImageFormat, ImageSpec};
use crate::config;
use crate::driver::{Driver, Timeout, SCAN_OK, SCAN_TIMEOUT};

/// Status for operations on a device that is not turned on.
const ERR_OFF: i32 = -1;
/// `scan` status for a device that is not turned on.
const ERR_SCAN_OFF: i32 = -2;

#[derive(Debug, Default)]
struct DeviceState {
    claimed: bool,
    on: bool,
}

/// Call counters, useful for checking acquire/release discipline.
#[derive(Debug, Default)]
struct Counters {
    gets: AtomicUsize,
    puts: AtomicUsize,
    ons: AtomicUsize,
    offs: AtomicUsize,
    scans: AtomicUsize,
}

/// Snapshot of [`DummyDriver`] call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DummyStats {
    pub gets: usize,
    pub puts: usize,
    pub ons: usize,
    pub offs: usize,
    pub scans: usize,
}

/// Claimed dummy device, identified by its index.
#[derive(Debug)]
pub struct DummyHandle(usize);

#[derive(Debug)]
pub struct DummyDriver {
    names: Vec<String>,
    state: Mutex<Vec<DeviceState>>,
    counters: Counters,
    format: ImageFormat,
    image: Option<Vec<u8>>,
    iso_template: Option<Vec<u8>>,
    scan_delay: Duration,
}

impl Default for DummyDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDriver {
    /// Single device named "Dummy" providing both image and template.
    pub fn new() -> Self {
        Self::with_devices(&[config::dummy::DEVICE_NAME])
    }

    pub fn with_devices(names: &[&str]) -> Self {
        let width = config::dummy::IMAGE_WIDTH;
        let height = config::dummy::IMAGE_HEIGHT;
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            state: Mutex::new(names.iter().map(|_| DeviceState::default()).collect()),
            counters: Counters::default(),
            format: ImageFormat::Gray8,
            image: Some(ridge_image(width, height)),
            iso_template: Some(iso_template_record(width as u16, height as u16)),
            scan_delay: Duration::ZERO,
        }
    }

    /// Report no image support.
    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    /// Report no template support.
    pub fn without_iso_template(mut self) -> Self {
        self.iso_template = None;
        self
    }

    /// Provide images in inverted polarity.
    pub fn inverted(mut self) -> Self {
        self.format = ImageFormat::Gray8Inverted;
        if let Some(image) = self.image.as_mut() {
            image.iter_mut().for_each(|v| *v = 0xff - *v);
        }
        self
    }

    /// Time a finger takes to "arrive" on the sensor.
    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = delay;
        self
    }

    pub fn stats(&self) -> DummyStats {
        DummyStats {
            gets: self.counters.gets.load(Ordering::SeqCst),
            puts: self.counters.puts.load(Ordering::SeqCst),
            ons: self.counters.ons.load(Ordering::SeqCst),
            offs: self.counters.offs.load(Ordering::SeqCst),
            scans: self.counters.scans.load(Ordering::SeqCst),
        }
    }

    /// Whether the named device is currently turned on.
    pub fn is_on(&self, name: &str) -> bool {
        let state = self.lock();
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| state[i].on)
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeviceState>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_handle_on(&self, handle: &DummyHandle) -> bool {
        self.lock()[handle.0].on
    }

    fn fill(&self, handle: &DummyHandle, source: Option<&[u8]>, buffer: &mut [u8]) -> i32 {
        if !self.is_handle_on(handle) {
            return ERR_OFF;
        }
        let Some(source) = source else {
            return ERR_OFF;
        };
        let n = buffer.len().min(source.len());
        buffer[..n].copy_from_slice(&source[..n]);
        source.len() as i32
    }
}

impl Driver for DummyDriver {
    type Handle = DummyHandle;

    fn list(&self) -> Vec<String> {
        self.names.clone()
    }

    fn get(&self, name: &str) -> Option<DummyHandle> {
        self.counters.gets.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let index = self
            .names
            .iter()
            .enumerate()
            .position(|(i, n)| n == name && !state[i].claimed)?;
        state[index].claimed = true;
        Some(DummyHandle(index))
    }

    fn put(&self, handle: DummyHandle) {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        self.lock()[handle.0].claimed = false;
    }

    fn on(&self, handle: &DummyHandle) -> Result<(), i32> {
        self.counters.ons.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state[handle.0].on {
            return Err(ERR_OFF);
        }
        state[handle.0].on = true;
        Ok(())
    }

    fn off(&self, handle: &DummyHandle) {
        self.counters.offs.fetch_add(1, Ordering::SeqCst);
        self.lock()[handle.0].on = false;
    }

    fn caps(&self, handle: &DummyHandle) -> Result<Capabilities, i32> {
        if !self.is_handle_on(handle) {
            return Err(ERR_OFF);
        }
        Ok(Capabilities {
            name: self.names[handle.0].clone(),
            image: self.image.as_ref().map(|_| ImageSpec {
                format: self.format,
                width: config::dummy::IMAGE_WIDTH,
                height: config::dummy::IMAGE_HEIGHT,
            }),
            iso_template: self.iso_template.is_some(),
            image_issue: None,
        })
    }

    fn scan(&self, handle: &DummyHandle, timeout: Timeout) -> i32 {
        self.counters.scans.fetch_add(1, Ordering::SeqCst);
        if !self.is_handle_on(handle) {
            return ERR_SCAN_OFF;
        }
        if self.scan_delay.is_zero() {
            return SCAN_OK;
        }

        let (wait, status) = match timeout {
            Timeout::Poll => (Duration::ZERO, SCAN_TIMEOUT),
            Timeout::Infinite => (self.scan_delay, SCAN_OK),
            Timeout::After(limit) if limit < self.scan_delay => (limit, SCAN_TIMEOUT),
            Timeout::After(_) => (self.scan_delay, SCAN_OK),
        };
        debug!("Dummy scan waiting {:?}", wait);
        std::thread::sleep(wait);
        status
    }

    fn image(&self, handle: &DummyHandle, buffer: &mut [u8]) -> i32 {
        self.fill(handle, self.image.as_deref(), buffer)
    }

    fn iso_template(&self, handle: &DummyHandle, buffer: &mut [u8]) -> i32 {
        self.fill(handle, self.iso_template.as_deref(), buffer)
    }
}

/// Concentric ridges inside an elliptic fingertip on a white background.
fn ridge_image(width: u32, height: u32) -> Vec<u8> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 * 0.55);
    let (rx, ry) = (width as f32 * 0.42, height as f32 * 0.45);
    let mut pixels = Vec::with_capacity((width * height) as usize);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if (dx / rx).powi(2) + (dy / ry).powi(2) > 1.0 {
                pixels.push(0xff);
                continue;
            }
            let r = (dx * dx + dy * dy * 0.6).sqrt();
            let ridge = (r / 2.2).sin() * 0.5 + 0.5;
            pixels.push((40.0 + ridge * 180.0) as u8);
        }
    }

    pixels
}

/// Minutiae as (type, x, y, angle, quality).
const MINUTIAE: &[(u8, u16, u16, u8, u8)] = &[
    (1, 62, 88, 40, 80),
    (2, 101, 120, 132, 75),
    (1, 130, 71, 201, 60),
    (2, 77, 160, 18, 90),
    (1, 118, 182, 96, 70),
    (2, 92, 204, 250, 65),
];

/// ISO/IEC 19794-2:2005 finger minutiae record with a single view.
pub(crate) fn iso_template_record(width: u16, height: u16) -> Vec<u8> {
    const HEADER_LEN: usize = 24;
    const VIEW_HEADER_LEN: usize = 4;
    const MINUTIA_LEN: usize = 6;
    const EXTENDED_LEN: usize = 2;

    let total = HEADER_LEN + VIEW_HEADER_LEN + MINUTIAE.len() * MINUTIA_LEN + EXTENDED_LEN;
    let resolution = config::dummy::RESOLUTION;
    let mut record = Vec::with_capacity(total);

    record.extend_from_slice(b"FMR\0");
    record.extend_from_slice(b" 20\0");
    record.extend_from_slice(&(total as u32).to_be_bytes());
    // Capture equipment certification and device type.
    record.extend_from_slice(&0u16.to_be_bytes());
    record.extend_from_slice(&width.to_be_bytes());
    record.extend_from_slice(&height.to_be_bytes());
    record.extend_from_slice(&resolution.to_be_bytes());
    record.extend_from_slice(&resolution.to_be_bytes());
    record.push(1); // number of views
    record.push(0); // reserved

    record.push(2); // right index finger
    record.push(0); // view 0, live-scan plain
    record.push(60); // finger quality
    record.push(MINUTIAE.len() as u8);
    for &(kind, x, y, angle, quality) in MINUTIAE {
        record.extend_from_slice(&((u16::from(kind) << 14) | (x & 0x3fff)).to_be_bytes());
        record.extend_from_slice(&(y & 0x3fff).to_be_bytes());
        record.push(angle);
        record.push(quality);
    }
    record.extend_from_slice(&0u16.to_be_bytes());

    record
}
