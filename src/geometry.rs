/// Physical rotation of the primary display as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Map the raw `DMDO_*` value (0..=3) from the display mode; anything
    /// unexpected is treated as unrotated.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Orientation::Deg90,
            2 => Orientation::Deg180,
            3 => Orientation::Deg270,
            _ => Orientation::Deg0,
        }
    }
}

/// Primary-display bounds and rotation, sampled fresh for every position
/// computation — resolution and rotation can change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    /// Current (post-rotation) width in pixels.
    pub width: i32,
    /// Current (post-rotation) height in pixels.
    pub height: i32,
    pub orientation: Orientation,
}

impl ScreenGeometry {
    /// A zero-size result means no usable display; the overlay renders nothing.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Query the OS for the primary display. Returns a zero-size geometry when no
/// display is attached, which downstream code treats as "do not render".
#[cfg(windows)]
pub fn primary() -> ScreenGeometry {
    use windows::core::PCWSTR;
    use windows::Win32::Graphics::Gdi::{EnumDisplaySettingsW, DEVMODEW, ENUM_CURRENT_SETTINGS};
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    unsafe {
        let width = GetSystemMetrics(SM_CXSCREEN);
        let height = GetSystemMetrics(SM_CYSCREEN);

        let mut mode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };
        let orientation =
            if EnumDisplaySettingsW(PCWSTR::null(), ENUM_CURRENT_SETTINGS, &mut mode).as_bool() {
                Orientation::from_raw(mode.Anonymous1.Anonymous2.dmDisplayOrientation.0)
            } else {
                Orientation::Deg0
            };

        ScreenGeometry {
            width,
            height,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_orientation_mapping() {
        assert_eq!(Orientation::from_raw(0), Orientation::Deg0);
        assert_eq!(Orientation::from_raw(1), Orientation::Deg90);
        assert_eq!(Orientation::from_raw(2), Orientation::Deg180);
        assert_eq!(Orientation::from_raw(3), Orientation::Deg270);
        assert_eq!(Orientation::from_raw(17), Orientation::Deg0);
    }

    #[test]
    fn empty_geometry_detection() {
        let geom = ScreenGeometry {
            width: 0,
            height: 0,
            orientation: Orientation::Deg0,
        };
        assert!(geom.is_empty());

        let geom = ScreenGeometry {
            width: 1920,
            height: 1080,
            orientation: Orientation::Deg0,
        };
        assert!(!geom.is_empty());
    }
}
