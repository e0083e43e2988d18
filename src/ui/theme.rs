use eframe::egui::{self, Color32, Stroke, Visuals};

/// Window color definitions
#[derive(Debug, Clone)]
pub struct Theme {
    // Base colors
    pub bg_darkest: Color32,
    pub bg_dark: Color32,
    pub bg_medium: Color32,
    pub bg_light: Color32,

    // Text colors
    pub text_primary: Color32,
    pub text_muted: Color32,

    // Accent colors
    pub accent: Color32,
    pub accent_muted: Color32,

    // Address that could not be resolved
    pub unavailable: Color32,

    pub border: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self::slate()
    }
}

impl Theme {
    /// Slate theme - matches the tray icon
    pub fn slate() -> Self {
        Self {
            bg_darkest: Color32::from_rgb(17, 20, 23),
            bg_dark: Color32::from_rgb(27, 31, 35), // Icon background
            bg_medium: Color32::from_rgb(36, 41, 46),
            bg_light: Color32::from_rgb(52, 58, 64),

            text_primary: Color32::from_rgb(240, 242, 245),
            text_muted: Color32::from_rgb(140, 146, 153),

            accent: Color32::from_rgb(79, 163, 255), // Icon frame
            accent_muted: Color32::from_rgb(48, 110, 180),

            unavailable: Color32::from_rgb(239, 68, 68),

            border: Color32::from_rgb(63, 69, 76),
        }
    }

    /// Apply this theme to egui's visuals
    pub fn apply(&self, ctx: &egui::Context) {
        let mut visuals = Visuals::dark();

        visuals.window_fill = self.bg_dark;
        visuals.panel_fill = self.bg_dark;
        visuals.faint_bg_color = self.bg_medium;
        visuals.extreme_bg_color = self.bg_darkest;

        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text_primary);

        visuals.widgets.inactive.bg_fill = self.bg_medium;
        visuals.widgets.inactive.weak_bg_fill = self.bg_light;
        visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, self.border);
        visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.text_primary);

        visuals.widgets.hovered.bg_fill = self.bg_light;
        visuals.widgets.hovered.weak_bg_fill = self.bg_light;
        visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, self.accent);

        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.widgets.active.weak_bg_fill = self.accent_muted;
        visuals.widgets.active.bg_stroke = Stroke::new(1.0, self.accent);

        visuals.window_stroke = Stroke::new(1.0, self.border);
        visuals.window_shadow = egui::epaint::Shadow::NONE;

        ctx.set_visuals(visuals);
    }
}
