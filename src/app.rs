use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::sync::Notify;

use crate::config::WindowConfig;
use crate::resolver::{Resolver, SystemResolver};
use crate::scheduler::RefreshScheduler;
use crate::state::{SharedIpState, UserAction, WindowControl};
use crate::tray::{self, TrayHost};
use crate::ui::{self, theme::Theme};

/// Main application state
pub struct UcipsApp {
    /// Last known addresses
    state: SharedIpState,
    scheduler: RefreshScheduler<SystemResolver>,
    /// Visibility and quit control, shared with the tray
    window: Arc<WindowControl>,
    /// `None` when the platform tray could not be created
    tray: Option<TrayHost>,
    theme: Theme,
    /// Whether theme needs to be applied
    theme_dirty: bool,
}

impl UcipsApp {
    /// Create a new application instance
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        state: SharedIpState,
        scheduler: RefreshScheduler<SystemResolver>,
        config: &WindowConfig,
        quit_requested: Arc<Notify>,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let window = WindowControl::new(ctx.clone(), !config.start_hidden, quit_requested);
        #[cfg(windows)]
        let window = window.with_native_handle(native_handle(cc));
        let window = Arc::new(window);

        // Redraw the window whenever a publish lands
        {
            let ctx = ctx.clone();
            state.subscribe(move |_, _| ctx.request_repaint());
        }

        {
            let scheduler = scheduler.clone();
            let window = window.clone();
            tray::set_menu_handler(move |action| dispatch(action, &scheduler, &window));
        }

        let tray = {
            let ctx = ctx.clone();
            match TrayHost::start(&state, window.clone(), move || ctx.request_repaint()) {
                Ok(tray) => Some(tray),
                Err(e) => {
                    tracing::error!("Failed to create tray icon: {}", e);
                    None
                }
            }
        };

        // Without a tray a hidden window could never be reopened
        if tray.is_none() && !window.is_visible() {
            window.show();
        }

        Self {
            state,
            scheduler,
            window,
            tray,
            theme: Theme::default(),
            theme_dirty: true,
        }
    }
}

#[cfg(windows)]
fn native_handle(cc: &eframe::CreationContext<'_>) -> Option<isize> {
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};

    match cc.window_handle().ok()?.as_raw() {
        RawWindowHandle::Win32(handle) => Some(handle.hwnd.get()),
        _ => None,
    }
}

/// End the process if a quit request is still pending after `grace`.
///
/// A hidden window may never run the frame that applies the close command.
/// A normal shutdown drops this future together with the runtime.
pub async fn exit_after_quit<F>(quit_requested: Arc<Notify>, grace: Duration, exit: F)
where
    F: FnOnce(),
{
    quit_requested.notified().await;
    tokio::time::sleep(grace).await;
    tracing::warn!("Window did not close {:?} after quit, exiting", grace);
    exit();
}

/// Carry out a window or tray request
pub fn dispatch<R: Resolver>(
    action: UserAction,
    scheduler: &RefreshScheduler<R>,
    window: &WindowControl,
) {
    match action {
        UserAction::ToggleWindow => {
            // Reopening the window also refreshes what it shows
            if window.toggle() {
                scheduler.trigger_refresh();
            }
        }
        UserAction::Refresh => {
            scheduler.trigger_refresh();
        }
        UserAction::Quit => {
            tracing::info!("Quit requested");
            window.quit();
        }
    }
}

impl eframe::App for UcipsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.theme_dirty {
            self.theme.apply(ctx);
            self.theme_dirty = false;
        }

        // Closing the window hides it; only Quit ends the process
        if ctx.input(|i| i.viewport().close_requested()) && !self.window.is_quitting() {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.window.hide();
        }

        if let Some(tray) = &self.tray {
            tray.sync();
        }

        let snapshot = self.state.snapshot();
        if let Some(action) = ui::render_window(ctx, &self.theme, &snapshot) {
            dispatch(action, &self.scheduler, &self.window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Address;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::runtime::Handle;

    struct CountingResolver {
        calls: Arc<AtomicUsize>,
    }

    impl Resolver for CountingResolver {
        fn resolve_internal(&self) -> Address {
            Address::Unavailable
        }

        async fn resolve_external(&self) -> Address {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Address::Unavailable
        }
    }

    struct Fixture {
        scheduler: RefreshScheduler<CountingResolver>,
        state: SharedIpState,
        window: WindowControl,
        calls: Arc<AtomicUsize>,
    }

    fn setup(visible: bool) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = CountingResolver {
            calls: calls.clone(),
        };
        let state = SharedIpState::new();
        let scheduler = RefreshScheduler::new(resolver, state.clone(), Handle::current());
        let window = WindowControl::new(egui::Context::default(), visible, Arc::new(Notify::new()));
        Fixture {
            scheduler,
            state,
            window,
            calls,
        }
    }

    async fn wait_idle(state: &SharedIpState) {
        while state.snapshot().refreshing {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_refresh_action_triggers_cycle() {
        let f = setup(true);

        dispatch(UserAction::Refresh, &f.scheduler, &f.window);
        wait_idle(&f.state).await;

        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        assert!(f.window.is_visible());
        assert!(f.state.snapshot().last_updated.is_some());
    }

    #[tokio::test]
    async fn test_showing_window_refreshes_but_hiding_does_not() {
        let f = setup(false);

        dispatch(UserAction::ToggleWindow, &f.scheduler, &f.window);
        wait_idle(&f.state).await;
        assert!(f.window.is_visible());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        dispatch(UserAction::ToggleWindow, &f.scheduler, &f.window);
        wait_idle(&f.state).await;
        assert!(!f.window.is_visible());
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_quit_does_not_refresh() {
        let f = setup(true);

        dispatch(UserAction::Quit, &f.scheduler, &f.window);

        assert!(f.window.is_quitting());
        assert!(!f.state.snapshot().refreshing);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_quit_exits_after_grace() {
        let quit = Arc::new(Notify::new());
        let exited = Arc::new(AtomicBool::new(false));
        {
            let exited = exited.clone();
            tokio::spawn(exit_after_quit(quit.clone(), Duration::from_secs(2), move || {
                exited.store(true, Ordering::SeqCst)
            }));
        }

        // Nothing happens until quit is requested
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!exited.load(Ordering::SeqCst));

        let window = WindowControl::new(egui::Context::default(), false, quit.clone());
        window.quit();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!exited.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(exited.load(Ordering::SeqCst));
    }
}
