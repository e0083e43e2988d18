//! Window visibility and quit requests
//!
//! Shared between the window and the tray thread. None of this is part of the
//! IP state and none of it affects refresh timing.
//!
//! Viewport commands only take effect when eframe runs a frame, and a hidden
//! window may not get any. On Windows the window is therefore also shown
//! through its native handle, and every quit request is announced on
//! `quit_requested` so the process can end without the window loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eframe::egui;
use tokio::sync::Notify;

/// Show/hide/quit control for the main window
pub struct WindowControl {
    ctx: egui::Context,
    visible: AtomicBool,
    quitting: AtomicBool,
    quit_requested: Arc<Notify>,
    /// Win32 `HWND` of the root viewport
    #[cfg(windows)]
    hwnd: Option<isize>,
}

impl WindowControl {
    pub fn new(ctx: egui::Context, visible: bool, quit_requested: Arc<Notify>) -> Self {
        Self {
            ctx,
            visible: AtomicBool::new(visible),
            quitting: AtomicBool::new(false),
            quit_requested,
            #[cfg(windows)]
            hwnd: None,
        }
    }

    #[cfg(windows)]
    pub fn with_native_handle(mut self, hwnd: Option<isize>) -> Self {
        self.hwnd = hwnd;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn show(&self) {
        self.visible.store(true, Ordering::Release);
        #[cfg(windows)]
        self.show_native();
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
    }

    /// Hide the window. Closing the window ends up here too.
    pub fn hide(&self) {
        self.visible.store(false, Ordering::Release);
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
    }

    /// Flip visibility, returning whether the window is now shown
    pub fn toggle(&self) -> bool {
        if self.is_visible() {
            self.hide();
            false
        } else {
            self.show();
            true
        }
    }

    /// Ask the window to close for real and end the process
    pub fn quit(&self) {
        self.quitting.store(true, Ordering::Release);
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        self.quit_requested.notify_one();
    }

    /// A close request is an explicit quit rather than a hide
    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// Hidden windows get no frames on Windows, so the queued viewport
    /// command alone would never run
    #[cfg(windows)]
    fn show_native(&self) {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::{SW_SHOW, SetForegroundWindow, ShowWindow};

        let Some(hwnd) = self.hwnd else {
            return;
        };
        let hwnd = HWND(hwnd as *mut core::ffi::c_void);
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetForegroundWindow(hwnd);
        }
    }
}
