//! Binding to the native scanner library.
//!
//! The shared object is located next to the running executable (or through
//! `FPSCANNER_LIBRARY`) and loaded once per process. A failed load is cached
//! as well: there is no fallback and every later call reports the same error.

use std::ffi::{CStr, CString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_uint, c_void};
use libloading::Library;
use log::{debug, info, warn};
use once_cell::sync::Lazy;

use crate::caps::{Capabilities, ImageFormat, ImageSpec};
use crate::config;
use crate::driver::{Driver, Timeout};
use crate::error::{Result, ScannerError};

/// `struct scanner_caps` from scanner.h.
///
/// The two one-bit fields `image` and `iso_template` share one `unsigned`.
#[repr(C)]
struct RawCaps {
    name: *const c_char,
    flags: c_uint,
    image_format: c_int,
    image_width: c_int,
    image_height: c_int,
}

const CAPS_IMAGE: c_uint = 1 << 0;
const CAPS_ISO_TEMPLATE: c_uint = 1 << 1;

impl RawCaps {
    fn empty() -> Self {
        Self {
            name: ptr::null(),
            flags: 0,
            image_format: 0,
            image_width: 0,
            image_height: 0,
        }
    }

    /// # Safety
    /// `name` must be null or point to a NUL-terminated string.
    unsafe fn to_capabilities(&self) -> Capabilities {
        let name = if self.name.is_null() {
            String::new()
        } else {
            CStr::from_ptr(self.name).to_string_lossy().into_owned()
        };

        let (image, image_issue) = if self.flags & CAPS_IMAGE != 0 {
            match image_spec(self.image_format, self.image_width, self.image_height) {
                Ok(spec) => (Some(spec), None),
                Err(issue) => {
                    warn!("Scanner '{}' reports {}, ignoring its images", name, issue);
                    (None, Some(issue))
                }
            }
        } else {
            (None, None)
        };

        Capabilities {
            name,
            image,
            iso_template: self.flags & CAPS_ISO_TEMPLATE != 0,
            image_issue,
        }
    }
}

fn image_spec(
    format: c_int,
    width: c_int,
    height: c_int,
) -> std::result::Result<ImageSpec, String> {
    let format =
        ImageFormat::from_raw(format).ok_or_else(|| format!("unknown image format {}", format))?;
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(width), Ok(height)) => Ok(ImageSpec {
            format,
            width,
            height,
        }),
        _ => Err(format!("invalid image size {}x{}", width, height)),
    }
}

type InitFn = unsafe extern "C" fn() -> c_int;
type ListFn = unsafe extern "C" fn(*mut c_int) -> *const *const c_char;
type GetFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type HandleFn = unsafe extern "C" fn(*mut c_void);
type OnFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type CapsFn = unsafe extern "C" fn(*mut c_void, *mut RawCaps) -> c_int;
type ScanFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type BufferFn = unsafe extern "C" fn(*mut c_void, *mut c_void, c_int) -> c_int;

/// Resolved entry points of a loaded scanner library.
struct NativeLibrary {
    path: PathBuf,
    list: ListFn,
    get: GetFn,
    put: HandleFn,
    on: OnFn,
    off: HandleFn,
    get_caps: CapsFn,
    scan: ScanFn,
    get_image: BufferFn,
    get_iso_template: BufferFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

static LIBRARY: Lazy<std::result::Result<NativeLibrary, String>> = Lazy::new(NativeLibrary::open);

/// Paths tried in order when loading the library.
fn candidate_paths() -> Vec<PathBuf> {
    let file_name = libloading::library_filename(config::library::BASE_NAME);
    let mut paths = Vec::new();

    if let Some(path) = std::env::var_os(config::library::PATH_ENV) {
        paths.push(PathBuf::from(path));
    }

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir.join(&file_name));
        if let Some(parent) = dir.parent() {
            paths.push(parent.join(&file_name));
        }
    }

    // Bare file name: defer to the system loader search path.
    paths.push(PathBuf::from(file_name));
    paths
}

impl NativeLibrary {
    fn open() -> std::result::Result<Self, String> {
        let mut failures = Vec::new();

        for path in candidate_paths() {
            debug!("Trying native scanner library at {}", path.display());
            // SAFETY: loading runs the library's initializers; the scanner
            // library has no requirements beyond being loaded once.
            match unsafe { Library::new(&path) } {
                Ok(library) => return Self::bind(path, library),
                Err(e) => failures.push(format!("{}: {}", path.display(), e)),
            }
        }

        Err(format!("no loadable library found ({})", failures.join("; ")))
    }

    fn bind(path: PathBuf, library: Library) -> std::result::Result<Self, String> {
        macro_rules! symbol {
            ($ty:ty, $name:literal) => {
                // SAFETY: the symbol types match the declarations in scanner.h.
                unsafe {
                    *library
                        .get::<$ty>(concat!($name, "\0").as_bytes())
                        .map_err(|e| {
                            format!("{}: missing symbol {}: {}", path.display(), $name, e)
                        })?
                }
            };
        }

        let init = symbol!(InitFn, "scanner_init");
        let list = symbol!(ListFn, "scanner_list");
        let get = symbol!(GetFn, "scanner_get");
        let put = symbol!(HandleFn, "scanner_put");
        let on = symbol!(OnFn, "scanner_on");
        let off = symbol!(HandleFn, "scanner_off");
        let get_caps = symbol!(CapsFn, "scanner_get_caps");
        let scan = symbol!(ScanFn, "scanner_scan");
        let get_image = symbol!(BufferFn, "scanner_get_image");
        let get_iso_template = symbol!(BufferFn, "scanner_get_iso_template");

        // SAFETY: called exactly once, guarded by the process-wide Lazy.
        let err = unsafe { init() };
        if err != 0 {
            return Err(format!(
                "{}: scanner_init() returned {}",
                path.display(),
                err
            ));
        }

        info!("Loaded native scanner library from {}", path.display());
        Ok(NativeLibrary {
            path,
            list,
            get,
            put,
            on,
            off,
            get_caps,
            scan,
            get_image,
            get_iso_template,
            _library: library,
        })
    }
}

/// Claimed `struct scanner *` from the native library.
pub struct NativeHandle(NonNull<c_void>);

// SAFETY: the pointer is an opaque token owned by the library. The wrapper
// serializes all calls made through one handle.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Driver backed by the process-wide native library.
#[derive(Clone, Copy)]
pub struct NativeDriver {
    lib: &'static NativeLibrary,
}

impl fmt::Debug for NativeDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDriver")
            .field("path", &self.lib.path)
            .finish()
    }
}

impl NativeDriver {
    /// Load the native library on first use and return a driver for it.
    ///
    /// Safe to call from many threads; the library is loaded exactly once.
    pub fn load() -> Result<Self> {
        match &*LIBRARY {
            Ok(lib) => Ok(Self { lib }),
            Err(e) => Err(ScannerError::Load(e.clone())),
        }
    }

    /// Location the library was loaded from.
    pub fn library_path(&self) -> &Path {
        &self.lib.path
    }

    fn fill(f: BufferFn, handle: &NativeHandle, buffer: &mut [u8]) -> i32 {
        let size = c_int::try_from(buffer.len()).unwrap_or(c_int::MAX);
        let ptr = if buffer.is_empty() {
            ptr::null_mut()
        } else {
            buffer.as_mut_ptr().cast::<c_void>()
        };
        // SAFETY: the library writes at most `size` bytes into `ptr`.
        unsafe { f(handle.as_ptr(), ptr, size) }
    }
}

impl Driver for NativeDriver {
    type Handle = NativeHandle;

    fn list(&self) -> Vec<String> {
        let mut number: c_int = 0;
        // SAFETY: scanner_list returns a static array of `number` names.
        unsafe {
            let names = (self.lib.list)(&mut number);
            if names.is_null() || number <= 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(names, number as usize)
                .iter()
                .filter(|name| !name.is_null())
                .map(|&name| CStr::from_ptr(name).to_string_lossy().into_owned())
                .collect()
        }
    }

    fn get(&self, name: &str) -> Option<NativeHandle> {
        let name = CString::new(name).ok()?;
        // SAFETY: `name` outlives the call.
        let raw = unsafe { (self.lib.get)(name.as_ptr()) };
        NonNull::new(raw).map(NativeHandle)
    }

    fn put(&self, handle: NativeHandle) {
        // SAFETY: handle came from scanner_get and is consumed here.
        unsafe { (self.lib.put)(handle.as_ptr()) }
    }

    fn on(&self, handle: &NativeHandle) -> std::result::Result<(), i32> {
        // SAFETY: handle is a live claim.
        match unsafe { (self.lib.on)(handle.as_ptr()) } {
            0 => Ok(()),
            err => Err(err),
        }
    }

    fn off(&self, handle: &NativeHandle) {
        // SAFETY: handle is a live claim.
        unsafe { (self.lib.off)(handle.as_ptr()) }
    }

    fn caps(&self, handle: &NativeHandle) -> std::result::Result<Capabilities, i32> {
        let mut raw = RawCaps::empty();
        // SAFETY: `raw` matches struct scanner_caps and lives across the call;
        // the returned name points to static storage in the library.
        unsafe {
            match (self.lib.get_caps)(handle.as_ptr(), &mut raw) {
                0 => Ok(raw.to_capabilities()),
                err => Err(err),
            }
        }
    }

    fn scan(&self, handle: &NativeHandle, timeout: Timeout) -> i32 {
        // SAFETY: handle is a live claim.
        unsafe { (self.lib.scan)(handle.as_ptr(), timeout.as_millis()) }
    }

    fn image(&self, handle: &NativeHandle, buffer: &mut [u8]) -> i32 {
        Self::fill(self.lib.get_image, handle, buffer)
    }

    fn iso_template(&self, handle: &NativeHandle, buffer: &mut [u8]) -> i32 {
        Self::fill(self.lib.get_iso_template, handle, buffer)
    }
}
