//! Application state modules
//!
//! - `ip`: the shared address state written by refresh cycles
//! - `window`: cosmetic window visibility and the quit request

mod ip;
mod window;

pub use ip::{IpState, SharedIpState, display_address};
pub use window::WindowControl;

/// What a publish changed. Delivered to observers together with the
/// post-publish snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// A refresh cycle was accepted
    RefreshStarted,

    /// The internal address field was overwritten
    Internal,

    /// The external address field was overwritten
    External,

    /// The cycle completed and `last_updated` was stamped
    RefreshFinished,
}

impl StateChange {
    /// Whether the change can alter the address summary
    pub fn changes_addresses(self) -> bool {
        matches!(self, StateChange::Internal | StateChange::External)
    }
}

/// Requests coming from the window buttons and the tray menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// Show the window if hidden, hide it if shown
    ToggleWindow,

    /// Start a refresh cycle now
    Refresh,

    /// End the process
    Quit,
}
