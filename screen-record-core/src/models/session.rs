use std::fmt;

/// Opaque capture permission token, obtained once by the platform layer via
/// the system consent flow and handed to the core at construction time.
///
/// The core never interprets the contents; platform backends forward it to
/// the display-mirroring service when attaching the virtual display.
#[derive(Clone, PartialEq, Eq)]
pub struct PermissionToken(Vec<u8>);

impl PermissionToken {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PermissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Token contents stay out of logs.
        write!(f, "PermissionToken({} bytes)", self.0.len())
    }
}

/// Mirrored display geometry, as reported by the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
    pub density_dpi: u32,
}

impl DisplayInfo {
    /// Frame size for a session mirroring this display at native resolution.
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
