//! Centralized configuration and constants for the scanner binding.

/// Native library lookup.
pub mod library {
    /// Base name of the native scanner library, without platform prefix or suffix.
    pub const BASE_NAME: &str = "scanner";

    /// Environment variable holding an explicit path to the native library.
    pub const PATH_ENV: &str = "FPSCANNER_LIBRARY";
}

/// Scan defaults.
pub mod scan {
    /// Default timeout in milliseconds (-1 waits until a finger is presented).
    pub const DEFAULT_TIMEOUT_MS: i32 = -1;
}

/// Built-in dummy driver parameters.
pub mod dummy {
    pub const DEVICE_NAME: &str = "Dummy";
    pub const IMAGE_WIDTH: u32 = 192;
    pub const IMAGE_HEIGHT: u32 = 256;
    /// Sensor resolution in pixels per centimeter (500 dpi).
    pub const RESOLUTION: u16 = 197;
}
