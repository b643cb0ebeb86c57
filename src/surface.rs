// Alpha-composited overlay surface built on a Win32 layered window.
//
// The window is borderless, click-through, excluded from the taskbar and
// Alt-Tab, never activated, and lives in the topmost z-band. All pixel
// updates go through a single UpdateLayeredWindow call so size, position,
// per-pixel alpha and the constant opacity multiplier change atomically —
// there is no partial-frame flash.
//
// Z-order strategy: some shell events silently demote layered windows, so
// every render re-asserts HWND_TOPMOST with flags that avoid owner
// reordering and repaint side effects.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject,
    AC_SRC_ALPHA, AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION,
    DIB_RGB_COLORS, HDC, HGDIOBJ,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, SetWindowPos, ShowWindow,
    HWND_TOPMOST, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOREDRAW, SWP_NOSENDCHANGING,
    SWP_NOSIZE, SW_HIDE, SW_SHOWNOACTIVATE, ULW_ALPHA, UpdateLayeredWindow, WM_DISPLAYCHANGE,
    WNDCLASSW, WS_DISABLED, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_EX_TRANSPARENT, WS_POPUP,
};

use crate::bitmap::ArgbBitmap;
use crate::position::Position;

const CLASS_NAME: &str = "DesktopImageOverlay\0";

static CLASS_REGISTERED: Mutex<bool> = Mutex::new(false);

/// Callback invoked from the window procedure when the OS broadcasts a
/// display-settings change. Runs on the thread that owns the surface.
static DISPLAY_CHANGE_HOOK: Lazy<Mutex<Option<Box<dyn Fn() + Send>>>> =
    Lazy::new(|| Mutex::new(None));

/// Install the hook that fires on WM_DISPLAYCHANGE. Replaces any previous hook.
pub fn set_display_change_hook<F>(hook: F)
where
    F: Fn() + Send + 'static,
{
    *DISPLAY_CHANGE_HOOK.lock().unwrap() = Some(Box::new(hook));
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_DISPLAYCHANGE {
        if let Ok(hook) = DISPLAY_CHANGE_HOOK.lock() {
            if let Some(hook) = hook.as_ref() {
                hook();
            }
        }
        return LRESULT(0);
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn register_class() -> Result<()> {
    let mut registered = CLASS_REGISTERED.lock().unwrap();
    if *registered {
        return Ok(());
    }

    unsafe {
        let hinstance = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();
        let class_name: Vec<u16> = CLASS_NAME.encode_utf16().collect();

        let wc = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: hinstance.into(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            ..Default::default()
        };

        if RegisterClassW(&wc) == 0 {
            bail!("failed to register overlay window class");
        }
    }
    *registered = true;
    Ok(())
}

// Scoped GDI resources. Each guard releases its handle on every exit path,
// including early returns when a later acquisition or the composite fails.

struct ScreenDc(HDC);

impl ScreenDc {
    fn acquire() -> Result<Self> {
        let dc = unsafe { GetDC(None) };
        if dc.is_invalid() {
            bail!("failed to acquire the screen device context");
        }
        Ok(Self(dc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

struct MemoryDc(HDC);

impl MemoryDc {
    fn compatible_with(screen: &ScreenDc) -> Result<Self> {
        let dc = unsafe { CreateCompatibleDC(Some(screen.0)) };
        if dc.is_invalid() {
            bail!("failed to create a memory device context");
        }
        Ok(Self(dc))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// A 32-bit top-down DIB selected into a memory DC. Dropping restores the
/// previous selection and deletes the bitmap.
struct SelectedDib<'a> {
    dc: &'a MemoryDc,
    bitmap: HGDIOBJ,
    previous: HGDIOBJ,
}

impl<'a> SelectedDib<'a> {
    fn from_bitmap(screen: &ScreenDc, dc: &'a MemoryDc, source: &ArgbBitmap) -> Result<Self> {
        let header = BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: source.width as i32,
            // Negative height makes the DIB top-down, matching the pixel rows.
            biHeight: -(source.height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        };
        let info = BITMAPINFO {
            bmiHeader: header,
            ..Default::default()
        };

        let mut bits: *mut core::ffi::c_void = std::ptr::null_mut();
        let hbitmap = unsafe {
            CreateDIBSection(Some(screen.0), &info, DIB_RGB_COLORS, &mut bits, None, 0)
        }
        .context("failed to create DIB section for overlay bitmap")?;

        if bits.is_null() {
            unsafe {
                let _ = DeleteObject(hbitmap.into());
            }
            bail!("DIB section has no pixel storage");
        }

        unsafe {
            std::ptr::copy_nonoverlapping(
                source.pixels.as_ptr(),
                bits as *mut u8,
                source.pixels.len(),
            );
        }

        let previous = unsafe { SelectObject(dc.0, hbitmap.into()) };
        Ok(Self {
            dc,
            bitmap: hbitmap.into(),
            previous,
        })
    }
}

impl Drop for SelectedDib<'_> {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc.0, self.previous);
            let _ = DeleteObject(self.bitmap);
        }
    }
}

/// Owns one layered overlay window. Holds a raw `HWND`, so the type is not
/// `Send`: composite calls can only come from the thread that created it.
pub struct LayeredSurface {
    hwnd: HWND,
}

impl LayeredSurface {
    /// Create the (initially hidden) overlay window.
    pub fn create() -> Result<Self> {
        register_class()?;

        unsafe {
            let hinstance = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();
            let class_name: Vec<u16> = CLASS_NAME.encode_utf16().collect();

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED
                    | WS_EX_TRANSPARENT
                    | WS_EX_TOPMOST
                    | WS_EX_TOOLWINDOW
                    | WS_EX_NOACTIVATE,
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WS_POPUP | WS_DISABLED,
                0,
                0,
                1,
                1,
                None,
                None,
                Some(hinstance.into()),
                None,
            )
            .context("failed to create overlay window")?;

            Ok(Self { hwnd })
        }
    }

    /// Push the bitmap to the compositor at `position` with the given
    /// constant alpha multiplier, in one atomic update.
    ///
    /// A `Disabled` position hides the surface and issues no composite call.
    pub fn render(&self, bitmap: &ArgbBitmap, position: Position, alpha: u8) -> Result<()> {
        let Position::At { left, top } = position else {
            self.hide();
            return Ok(());
        };

        {
            let screen_dc = ScreenDc::acquire()?;
            let mem_dc = MemoryDc::compatible_with(&screen_dc)?;
            let dib = SelectedDib::from_bitmap(&screen_dc, &mem_dc, bitmap)?;

            let destination = POINT { x: left, y: top };
            let size = SIZE {
                cx: bitmap.width as i32,
                cy: bitmap.height as i32,
            };
            let source_origin = POINT { x: 0, y: 0 };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: alpha,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };

            unsafe {
                UpdateLayeredWindow(
                    self.hwnd,
                    Some(screen_dc.0),
                    Some(&destination),
                    Some(&size),
                    Some(mem_dc.0),
                    Some(&source_origin),
                    COLORREF(0),
                    Some(&blend),
                    ULW_ALPHA,
                )
                .context("UpdateLayeredWindow failed")?;
            }
            drop(dib);
        }

        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
        }
        self.reassert_topmost();
        Ok(())
    }

    /// Force the window back into the topmost band. Some shell events demote
    /// layered windows without notice, so this runs after every composite.
    pub fn reassert_topmost(&self) {
        unsafe {
            let _ = SetWindowPos(
                self.hwnd,
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE
                    | SWP_NOSIZE
                    | SWP_NOACTIVATE
                    | SWP_NOOWNERZORDER
                    | SWP_NOREDRAW
                    | SWP_NOSENDCHANGING,
            );
        }
    }

    fn hide(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }
}

impl Drop for LayeredSurface {
    fn drop(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
            let _ = DestroyWindow(self.hwnd);
        }
    }
}
