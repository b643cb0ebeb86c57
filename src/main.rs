// Prevents console window in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod bitmap;
mod config;
mod geometry;
mod logging;
mod overlay;
mod position;
#[cfg(windows)]
mod surface;

fn main() {
    logging::init();

    if let Err(err) = run() {
        tracing::error!(error = format!("{err:#}").as_str(), "fatal error");
        report_fatal(&err);
        std::process::exit(1);
    }
}

#[cfg(windows)]
fn run() -> anyhow::Result<()> {
    // Single-instance check: a second copy would stack a duplicate overlay.
    if is_already_running() {
        tracing::warn!("another instance is already running, exiting");
        return Ok(());
    }

    let config = config::load_or_init(&config::config_path())?;
    tracing::debug!(?config, "configuration loaded");

    let mut controller = overlay::RefreshController::new(config);
    controller.start()?;
    controller.run()
}

#[cfg(not(windows))]
fn run() -> anyhow::Result<()> {
    anyhow::bail!("desktopimage only runs on Windows");
}

#[cfg(windows)]
const SINGLE_INSTANCE_MUTEX: &str = "DesktopImageMutex\0";

/// Check if another instance is already running
#[cfg(windows)]
fn is_already_running() -> bool {
    use windows::core::PCWSTR;
    use windows::Win32::System::Threading::{
        CreateMutexW, OpenMutexW, SYNCHRONIZATION_ACCESS_RIGHTS,
    };

    let name: Vec<u16> = SINGLE_INSTANCE_MUTEX.encode_utf16().collect();

    unsafe {
        // Try to open existing mutex
        let existing = OpenMutexW(
            SYNCHRONIZATION_ACCESS_RIGHTS(0x001F0001), // MUTEX_ALL_ACCESS
            false,
            PCWSTR(name.as_ptr()),
        );
        if existing.is_ok() {
            return true;
        }

        // Create the mutex (this instance owns it)
        let _ = CreateMutexW(None, true, PCWSTR(name.as_ptr()));
        false
    }
}

/// Surface a fatal error to the operator before exiting, the way a windowed
/// process without a console has to: a message box.
#[cfg(windows)]
fn report_fatal(err: &anyhow::Error) {
    use windows::core::PCWSTR;
    use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

    let message = format!("{err:#}");
    let msg_wide: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();
    let title_wide: Vec<u16> = "DesktopImage"
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let _ = MessageBoxW(
            None,
            PCWSTR(msg_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

#[cfg(not(windows))]
fn report_fatal(err: &anyhow::Error) {
    eprintln!("desktopimage: {err:#}");
}
