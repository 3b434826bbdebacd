//! Counting mock driver with failure injection.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use fpscanner::{Capabilities, Driver, ImageFormat, ImageSpec, Timeout};

#[derive(Debug, Default)]
pub struct Calls {
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub ons: AtomicUsize,
    pub offs: AtomicUsize,
    pub caps: AtomicUsize,
    pub scans: AtomicUsize,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockDevice {
    pub name: String,
    pub caps: Capabilities,
}

pub struct MockDriver {
    pub devices: Vec<MockDevice>,
    pub calls: Calls,
    pub fail_on: Option<i32>,
    pub fail_caps: Option<i32>,
    pub scan_status: i32,
    pub image_status: Option<i32>,
    pub image: Vec<u8>,
    pub iso_template: Vec<u8>,
    powered: Mutex<Vec<bool>>,
    claimed: Mutex<Vec<bool>>,
}

#[derive(Debug)]
pub struct MockHandle(usize);

pub fn gray8_caps(name: &str, width: u32, height: u32) -> Capabilities {
    Capabilities {
        name: name.to_string(),
        image: Some(ImageSpec {
            format: ImageFormat::Gray8,
            width,
            height,
        }),
        iso_template: false,
        image_issue: None,
    }
}

impl MockDriver {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let n = devices.len();
        Self {
            devices,
            calls: Calls::default(),
            fail_on: None,
            fail_caps: None,
            scan_status: 0,
            image_status: None,
            image: vec![0x80; 320 * 240],
            iso_template: b"FMR\0 20\0".to_vec(),
            powered: Mutex::new(vec![false; n]),
            claimed: Mutex::new(vec![false; n]),
        }
    }

    /// "dev-A" with a 320x240 gray image and "dev-B" with templates only.
    pub fn two_devices() -> Self {
        Self::new(vec![
            MockDevice {
                name: "dev-A".to_string(),
                caps: gray8_caps("dev-A", 320, 240),
            },
            MockDevice {
                name: "dev-B".to_string(),
                caps: Capabilities {
                    name: "dev-B".to_string(),
                    image: None,
                    iso_template: true,
                    image_issue: None,
                },
            },
        ])
    }

    pub fn is_on(&self, name: &str) -> bool {
        let powered = self.powered.lock().unwrap();
        self.devices
            .iter()
            .position(|d| d.name == name)
            .map(|i| powered[i])
            .unwrap_or(false)
    }

    pub fn ons(&self) -> usize {
        Calls::count(&self.calls.ons)
    }

    pub fn offs(&self) -> usize {
        Calls::count(&self.calls.offs)
    }

    pub fn puts(&self) -> usize {
        Calls::count(&self.calls.puts)
    }

    fn fill(source: &[u8], buffer: &mut [u8]) -> i32 {
        let n = buffer.len().min(source.len());
        buffer[..n].copy_from_slice(&source[..n]);
        source.len() as i32
    }
}

impl Driver for MockDriver {
    type Handle = MockHandle;

    fn list(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<MockHandle> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        let mut claimed = self.claimed.lock().unwrap();
        let index = self.devices.iter().position(|d| d.name == name)?;
        if claimed[index] {
            return None;
        }
        claimed[index] = true;
        Some(MockHandle(index))
    }

    fn put(&self, handle: MockHandle) {
        self.calls.puts.fetch_add(1, Ordering::SeqCst);
        self.claimed.lock().unwrap()[handle.0] = false;
    }

    fn on(&self, handle: &MockHandle) -> Result<(), i32> {
        self.calls.ons.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.fail_on {
            return Err(code);
        }
        self.powered.lock().unwrap()[handle.0] = true;
        Ok(())
    }

    fn off(&self, handle: &MockHandle) {
        self.calls.offs.fetch_add(1, Ordering::SeqCst);
        self.powered.lock().unwrap()[handle.0] = false;
    }

    fn caps(&self, handle: &MockHandle) -> Result<Capabilities, i32> {
        self.calls.caps.fetch_add(1, Ordering::SeqCst);
        match self.fail_caps {
            Some(code) => Err(code),
            None => Ok(self.devices[handle.0].caps.clone()),
        }
    }

    fn scan(&self, _handle: &MockHandle, _timeout: Timeout) -> i32 {
        self.calls.scans.fetch_add(1, Ordering::SeqCst);
        self.scan_status
    }

    fn image(&self, _handle: &MockHandle, buffer: &mut [u8]) -> i32 {
        match self.image_status {
            Some(code) => code,
            None => Self::fill(&self.image, buffer),
        }
    }

    fn iso_template(&self, _handle: &MockHandle, buffer: &mut [u8]) -> i32 {
        Self::fill(&self.iso_template, buffer)
    }
}
