// Overlay lifecycle: one live rendered generation at a time, rebuilt on a
// renewal timer and on display-configuration changes.
//
// Threading model: the surface is owned by the thread that runs
// `RefreshController::run`. The renewal timer fires on a worker thread and
// only ever sends a trigger through the channel; it cannot touch the surface
// because `LayeredSurface` is not `Send`. Display-change notifications
// arrive through the window procedure on the owner thread and are routed
// into the same channel, so every rebuild is performed serially by the one
// consumer loop.

use std::sync::mpsc::Receiver;

/// Reason a rebuild was requested. Both triggers lead to the same action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The fixed-period renewal timer elapsed.
    Timer,
    /// The OS reported a display/orientation change.
    DisplayChange,
}

/// Drain triggers that queued up behind the one being handled, collapsing a
/// burst (e.g. a rotation that fires several change events) into one rebuild.
fn drain_pending(rx: &Receiver<RefreshTrigger>) -> usize {
    let mut drained = 0;
    while rx.try_recv().is_ok() {
        drained += 1;
    }
    drained
}

#[cfg(windows)]
pub use platform::{OverlayInstance, RefreshController};

#[cfg(windows)]
mod platform {
    use super::{drain_pending, RefreshTrigger};
    use crate::bitmap::{alpha_multiplier, ArgbBitmap};
    use crate::config::PlacementConfig;
    use crate::geometry;
    use crate::position::{self, Position};
    use crate::surface::{self, LayeredSurface};
    use anyhow::Result;
    use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
    use std::thread;
    use std::time::Duration;

    /// One rendered image generation: a surface, the scaled bitmap pushed to
    /// it, and the position and opacity it was last rendered with.
    ///
    /// Dropping the instance destroys its window; the controller drops the
    /// previous instance only after the replacement is fully rendered.
    pub struct OverlayInstance {
        surface: LayeredSurface,
        bitmap: ArgbBitmap,
        position: Position,
        alpha: u8,
    }

    impl OverlayInstance {
        /// Build a complete new generation: reload and rescale the bitmap,
        /// sample screen geometry fresh, compute the position, then render
        /// into a freshly created surface.
        pub fn build(config: &PlacementConfig) -> Result<Self> {
            let bitmap = ArgbBitmap::load_scaled(&config.image_path(), config.scale)?;
            let geometry = geometry::primary();
            let position = position::compute(geometry, config, bitmap.width, bitmap.height);
            let alpha = alpha_multiplier(config.opacity);

            let surface = LayeredSurface::create()?;
            surface.render(&bitmap, position, alpha)?;

            Ok(Self {
                surface,
                bitmap,
                position,
                alpha,
            })
        }

        pub fn position(&self) -> Position {
            self.position
        }

        pub fn bitmap_size(&self) -> (u32, u32) {
            (self.bitmap.width, self.bitmap.height)
        }

        pub fn alpha(&self) -> u8 {
            self.alpha
        }

        /// Re-apply the topmost z-order without recompositing.
        pub fn reassert_topmost(&self) {
            self.surface.reassert_topmost();
        }
    }

    /// Owns the single live overlay instance and the triggers that renew it.
    pub struct RefreshController {
        config: PlacementConfig,
        live: Option<OverlayInstance>,
        tx: Sender<RefreshTrigger>,
        rx: Receiver<RefreshTrigger>,
    }

    impl RefreshController {
        pub fn new(config: PlacementConfig) -> Self {
            let (tx, rx) = channel();
            Self {
                config,
                live: None,
                tx,
                rx,
            }
        }

        /// Perform the initial build and wire up the triggers. A failure
        /// here is fatal: there is no previous instance to fall back to.
        pub fn start(&mut self) -> Result<()> {
            let instance = OverlayInstance::build(&self.config)?;
            tracing::info!(
                position = ?instance.position(),
                size = ?instance.bitmap_size(),
                alpha = instance.alpha(),
                "overlay shown"
            );
            self.live = Some(instance);

            if self.config.tracks_display_changes() {
                let tx = self.tx.clone();
                surface::set_display_change_hook(move || {
                    let _ = tx.send(RefreshTrigger::DisplayChange);
                });
            }

            if self.config.renew_secs > 0 {
                let tx = self.tx.clone();
                let period = Duration::from_secs(self.config.renew_secs);
                thread::Builder::new()
                    .name("overlay-renew".into())
                    .spawn(move || loop {
                        thread::sleep(period);
                        if tx.send(RefreshTrigger::Timer).is_err() {
                            break;
                        }
                    })?;
            }

            Ok(())
        }

        /// Owner-thread loop: pump Win32 messages (which delivers
        /// WM_DISPLAYCHANGE to the surface's window procedure) and dequeue
        /// rebuild triggers, handling them one at a time.
        pub fn run(mut self) -> ! {
            loop {
                pump_messages();
                match self.rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(trigger) => {
                        let coalesced = drain_pending(&self.rx);
                        if coalesced > 0 {
                            tracing::debug!(coalesced, "collapsed queued refresh triggers");
                        }
                        self.rebuild(trigger);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    // Cannot happen while `self.tx` is alive.
                    Err(RecvTimeoutError::Disconnected) => {}
                }
            }
        }

        /// Build-before-dispose swap. On failure the previous instance stays
        /// live: a failed rebuild must never take down a visible overlay.
        fn rebuild(&mut self, trigger: RefreshTrigger) {
            match OverlayInstance::build(&self.config) {
                Ok(instance) => {
                    tracing::debug!(
                        ?trigger,
                        position = ?instance.position(),
                        "overlay rebuilt"
                    );
                    let previous = self.live.replace(instance);
                    drop(previous);
                }
                Err(err) => {
                    tracing::error!(?trigger, error = %err, "rebuild failed, keeping previous overlay");
                    if let Some(previous) = &self.live {
                        previous.reassert_topmost();
                    }
                }
            }
        }
    }

    fn pump_messages() {
        use windows::Win32::UI::WindowsAndMessaging::{
            DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
        };

        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn drain_collapses_queued_triggers() {
        let (tx, rx) = channel();
        tx.send(RefreshTrigger::Timer).unwrap();
        tx.send(RefreshTrigger::DisplayChange).unwrap();
        tx.send(RefreshTrigger::Timer).unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first, RefreshTrigger::Timer);
        assert_eq!(drain_pending(&rx), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drain_on_empty_channel_is_zero() {
        let (_tx, rx) = channel::<RefreshTrigger>();
        assert_eq!(drain_pending(&rx), 0);
    }
}
