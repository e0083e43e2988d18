//! Main window rendering

use eframe::egui::{self, RichText};

use crate::resolver::Address;
use crate::state::{IpState, UserAction, display_address};
use crate::ui::theme::Theme;

/// Render the address window. Returns the action of a clicked button, if any.
pub fn render_window(ctx: &egui::Context, theme: &Theme, state: &IpState) -> Option<UserAction> {
    let mut action = None;

    egui::CentralPanel::default().show(ctx, |ui| {
        render_address(ui, theme, state.internal, "Internal");
        ui.add_space(6.0);
        render_address(ui, theme, state.external, "External");

        ui.add_space(6.0);
        ui.label(
            RichText::new(state.status_text())
                .size(12.0)
                .color(theme.text_muted),
        );

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Refresh").clicked() {
                action = Some(UserAction::Refresh);
            }
            if ui.button("Quit").clicked() {
                action = Some(UserAction::Quit);
            }
        });
    });

    action
}

/// An address in large bold text with a small caption underneath
fn render_address(ui: &mut egui::Ui, theme: &Theme, address: Option<Address>, caption: &str) {
    let color = match address {
        Some(address) if !address.is_available() => theme.unavailable,
        _ => theme.text_primary,
    };

    ui.label(
        RichText::new(display_address(address))
            .size(20.0)
            .strong()
            .color(color),
    );
    ui.label(RichText::new(caption).size(11.0).color(theme.text_muted));
}
