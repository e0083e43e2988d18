//! System tray adapter
//!
//! The tray shows the address summary as its tooltip and as a disabled menu
//! label, and offers Show/Hide, Refresh and Quit. It never touches the IP
//! state directly: menu clicks become `UserAction`s and address changes arrive
//! as rendered summaries through a `SharedIpState` subscription.
//!
//! Summaries are pushed to the thread that owns the tray as soon as they are
//! published, independent of window frames. Windows runs the tray on its own
//! thread with a Win32 message pump and Linux on a GTK thread. macOS only
//! allows the tray on the main thread, where it is drained from the UI loop.

use std::sync::mpsc;

use anyhow::Result;
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{TrayIcon, TrayIconBuilder};

use crate::icon;
use crate::state::{IpState, SharedIpState, UserAction};

/// Tooltip before the first publish
const DEFAULT_TOOLTIP: &str = "UCIPS";

const MENU_ACTIONS: &[(&str, &str, UserAction)] = &[
    ("toggle", "Show/Hide", UserAction::ToggleWindow),
    ("refresh", "Refresh", UserAction::Refresh),
    ("quit", "Quit", UserAction::Quit),
];

/// Map a tray menu item id to its action
pub fn action_for_menu_id(id: &str) -> Option<UserAction> {
    MENU_ACTIONS
        .iter()
        .find(|(item_id, _, _)| *item_id == id)
        .map(|(_, _, action)| *action)
}

/// Route tray menu clicks to `handler`.
///
/// The handler runs on whichever thread hosts the tray.
pub fn set_menu_handler<F>(handler: F)
where
    F: Fn(UserAction) + Send + Sync + 'static,
{
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        match action_for_menu_id(event.id.0.as_str()) {
            Some(action) => {
                tracing::debug!("Tray menu: {:?}", action);
                handler(action);
            }
            None => tracing::debug!("Ignoring unknown tray menu item {:?}", event.id),
        }
    }));
}

/// The tray icon and the menu label that mirrors the IP state
struct Tray {
    icon: TrayIcon,
    summary: MenuItem,
}

impl Tray {
    fn build() -> Result<Self> {
        let summary = MenuItem::new(IpState::default().summary(), false, None);

        let menu = Menu::new();
        menu.append(&summary)?;
        menu.append(&PredefinedMenuItem::separator())?;
        for (id, label, _) in MENU_ACTIONS {
            menu.append(&MenuItem::with_id(*id, *label, true, None))?;
        }

        let icon = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(DEFAULT_TOOLTIP)
            .with_icon(icon::for_tray()?)
            .build()?;

        tracing::info!("Tray icon created");
        Ok(Self { icon, summary })
    }

    fn render(&self, summary: &str) {
        self.summary.set_text(summary);
        if let Err(e) = self.icon.set_tooltip(Some(summary)) {
            tracing::warn!("Failed to update tray tooltip: {}", e);
        }
    }

    /// Show the newest pending summary, if any
    fn drain(&self, summaries: &mpsc::Receiver<String>) {
        if let Some(summary) = summaries.try_iter().last() {
            self.render(&summary);
        }
    }
}

/// Forward every address change to the tray as a rendered summary.
///
/// `wake` runs after each send so the thread owning the tray can drain the
/// receiver. Changes that leave both addresses untouched are skipped.
fn feed<W>(state: &SharedIpState, wake: W) -> mpsc::Receiver<String>
where
    W: Fn() + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel();
    state.subscribe(move |change, snapshot| {
        if change.changes_addresses() && tx.send(snapshot.summary()).is_ok() {
            wake();
        }
    });
    rx
}

#[cfg(not(any(windows, target_os = "linux")))]
pub use main_thread::TrayHost;

#[cfg(not(any(windows, target_os = "linux")))]
mod main_thread {
    use std::sync::Arc;

    use super::*;
    use crate::state::WindowControl;

    /// Tray living on the UI thread
    pub struct TrayHost {
        tray: Tray,
        summaries: mpsc::Receiver<String>,
    }

    impl TrayHost {
        /// Create the tray. `wake` is called after every address change so
        /// the UI loop gets a chance to run `sync`.
        pub fn start<W>(
            state: &SharedIpState,
            _window: Arc<WindowControl>,
            wake: W,
        ) -> Result<Self>
        where
            W: Fn() + Send + Sync + 'static,
        {
            let summaries = feed(state, wake);
            let tray = Tray::build()?;
            tray.render(&state.snapshot().summary());
            Ok(Self { tray, summaries })
        }

        /// Apply summaries published since the last call
        pub fn sync(&self) {
            self.tray.drain(&self.summaries);
        }
    }
}

#[cfg(windows)]
pub use win32_thread::TrayHost;

#[cfg(windows)]
mod win32_thread {
    use std::sync::Arc;

    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, MSG, PostThreadMessageW, TranslateMessage, WM_APP, WM_QUIT,
    };

    use super::*;
    use crate::state::WindowControl;

    /// Thread message: summaries are waiting in the feed
    const WM_TRAY_UPDATE: u32 = WM_APP + 1;

    fn post(thread_id: u32, message: u32) -> bool {
        unsafe { PostThreadMessageW(thread_id, message, WPARAM(0), LPARAM(0)).is_ok() }
    }

    /// Tray living on its own thread with a Win32 message pump
    pub struct TrayHost {
        thread_id: u32,
    }

    impl TrayHost {
        /// Spawn the tray thread and wait until the tray exists. Changes are
        /// posted to that thread directly, so `wake` is not needed.
        pub fn start<W>(
            state: &SharedIpState,
            window: Arc<WindowControl>,
            _wake: W,
        ) -> Result<Self>
        where
            W: Fn() + Send + Sync + 'static,
        {
            let state = state.clone();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32>>();

            std::thread::Builder::new()
                .name("tray".to_string())
                .spawn(move || {
                    // Building the tray creates this thread's message queue
                    let tray = match Tray::build() {
                        Ok(tray) => tray,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    let thread_id = unsafe { GetCurrentThreadId() };
                    let summaries = feed(&state, move || {
                        post(thread_id, WM_TRAY_UPDATE);
                    });
                    tray.render(&state.snapshot().summary());

                    let _ = ready_tx.send(Ok(thread_id));
                    pump(&tray, &summaries, &window);
                    tracing::debug!("Tray thread stopped");
                })?;

            let thread_id = ready_rx
                .recv()
                .map_err(|_| anyhow::anyhow!("Tray thread exited during startup"))??;

            Ok(Self { thread_id })
        }

        pub fn sync(&self) {}
    }

    impl Drop for TrayHost {
        fn drop(&mut self) {
            post(self.thread_id, WM_QUIT);
        }
    }

    /// Run until `WM_QUIT` or a quit request. Menu clicks are dispatched from
    /// here, so a Quit picked in the tray is seen right after its message.
    fn pump(tray: &Tray, summaries: &mpsc::Receiver<String>, window: &WindowControl) {
        let mut msg = MSG::default();
        // 0 on WM_QUIT, -1 on error
        while unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) }.0 > 0 {
            if msg.message == WM_TRAY_UPDATE {
                tray.drain(summaries);
            } else {
                unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }

            // Take the icon down before the process goes away
            if window.is_quitting() {
                break;
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use gtk_thread::TrayHost;

#[cfg(target_os = "linux")]
mod gtk_thread {
    use std::cell::RefCell;
    use std::sync::Arc;

    use gtk::glib;

    use super::*;
    use crate::state::WindowControl;

    thread_local! {
        static TRAY: RefCell<Option<(Tray, mpsc::Receiver<String>)>> = const { RefCell::new(None) };
    }

    /// Tray living on its own GTK thread
    pub struct TrayHost;

    impl TrayHost {
        /// Spawn the GTK thread and wait until the tray exists. Changes are
        /// pushed to the GTK thread directly, so `wake` is not needed.
        pub fn start<W>(
            state: &SharedIpState,
            _window: Arc<WindowControl>,
            _wake: W,
        ) -> Result<Self>
        where
            W: Fn() + Send + Sync + 'static,
        {
            let state = state.clone();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

            std::thread::Builder::new()
                .name("tray".to_string())
                .spawn(move || {
                    if let Err(e) = gtk::init() {
                        let _ = ready_tx.send(Err(anyhow::anyhow!("GTK init failed: {}", e)));
                        return;
                    }

                    let tray = match Tray::build() {
                        Ok(tray) => tray,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                    let summaries = feed(&state, || {
                        glib::MainContext::default().invoke(|| {
                            TRAY.with(|slot| {
                                if let Some((tray, summaries)) = slot.borrow().as_ref() {
                                    tray.drain(summaries);
                                }
                            });
                        });
                    });
                    tray.render(&state.snapshot().summary());
                    TRAY.with(|slot| *slot.borrow_mut() = Some((tray, summaries)));

                    let _ = ready_tx.send(Ok(()));
                    gtk::main();
                })?;

            ready_rx
                .recv()
                .map_err(|_| anyhow::anyhow!("Tray thread exited during startup"))??;

            Ok(Self)
        }

        pub fn sync(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_ids_map_to_actions() {
        assert_eq!(action_for_menu_id("toggle"), Some(UserAction::ToggleWindow));
        assert_eq!(action_for_menu_id("refresh"), Some(UserAction::Refresh));
        assert_eq!(action_for_menu_id("quit"), Some(UserAction::Quit));
        assert_eq!(action_for_menu_id("summary"), None);
    }

    #[test]
    fn test_feed_pushes_address_changes_without_a_frame() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use crate::resolver::Address;

        let state = SharedIpState::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let summaries = {
            let wakes = wakes.clone();
            feed(&state, move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            })
        };

        // Publishes from another thread, as a refresh cycle would
        let writer = {
            let state = state.clone();
            std::thread::spawn(move || {
                state.begin_refresh();
                state.publish_internal(Address::Resolved("10.0.0.2".parse().unwrap()));
                state.publish_external(Address::Unavailable);
                state.finish_refresh(chrono::Local::now());
            })
        };
        writer.join().unwrap();

        let pending: Vec<String> = summaries.try_iter().collect();
        assert_eq!(
            pending,
            vec![
                "Internal IP: 10.0.0.2 / External IP: --".to_string(),
                "Internal IP: 10.0.0.2 / External IP: Unavailable".to_string(),
            ]
        );
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_menu_ids_are_unique() {
        for (i, (id, _, _)) in MENU_ACTIONS.iter().enumerate() {
            assert!(MENU_ACTIONS[i + 1..].iter().all(|(other, _, _)| other != id));
        }
    }
}
