//! UI modules for the address window

pub mod theme;
mod window;

pub use window::render_window;
