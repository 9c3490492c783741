//! Overlay UI
//!
//! Title, photo upload button, mode buttons, gesture legend and a status
//! line. The overlay only reports what was clicked; the app applies it.

use egui::{Align2, Color32, RichText};

use crate::gesture::AppMode;

const GOLD: Color32 = Color32::from_rgb(0xd4, 0xaf, 0x37);
const CREAM: Color32 = Color32::from_rgb(0xfc, 0xee, 0xa7);

/// What the overlay shows this frame
#[derive(Clone, Debug)]
pub struct OverlayState {
    pub visible: bool,
    pub mode: AppMode,
    pub fps: f64,
    pub particle_count: usize,
    pub photo_count: usize,
    pub perception: &'static str,
    /// A photo pick is still running
    pub photo_busy: bool,
}

/// What the user clicked this frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayActions {
    pub add_photo: bool,
    pub force_mode: Option<AppMode>,
}

/// Apply the overlay look to a context
pub fn install_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals.window_shadow = egui::epaint::Shadow::NONE;
    style.visuals.panel_fill = Color32::TRANSPARENT;
    style.visuals.override_text_color = Some(GOLD);
    ctx.set_style(style);
}

/// Draw the overlay and collect clicks
pub fn draw_overlay(ctx: &egui::Context, state: &OverlayState) -> OverlayActions {
    let mut actions = OverlayActions::default();
    if !state.visible {
        return actions;
    }

    egui::Area::new(egui::Id::new("title"))
        .anchor(Align2::CENTER_TOP, [0.0, 40.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(RichText::new("Merry Christmas").size(56.0).strong().color(GOLD));
        });

    egui::Area::new(egui::Id::new("gesture_legend"))
        .anchor(Align2::LEFT_TOP, [16.0, 16.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label("Use Hand Gestures:");
            ui.label("Fist: Tree Mode");
            ui.label("Open: Scatter Mode");
            ui.label("Pinch: Focus Mode");
        });

    egui::Area::new(egui::Id::new("controls"))
        .anchor(Align2::CENTER_BOTTOM, [0.0, -40.0])
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                let upload = egui::Button::new(RichText::new("ADD MEMORIES").size(18.0));
                if ui.add_enabled(!state.photo_busy, upload).clicked() {
                    actions.add_photo = true;
                }

                ui.label(RichText::new("Press 'H' to Hide Controls").italics().color(CREAM.gamma_multiply(0.6)));

                ui.horizontal(|ui| {
                    for &mode in AppMode::all() {
                        let active = mode == state.mode;
                        let text = RichText::new(mode.display_name())
                            .size(12.0)
                            .color(if active { Color32::BLACK } else { GOLD });
                        let button = egui::Button::new(text)
                            .fill(if active { GOLD } else { Color32::TRANSPARENT })
                            .stroke(egui::Stroke::new(1.0, GOLD));
                        if ui.add(button).clicked() {
                            actions.force_mode = Some(mode);
                        }
                    }
                });
            });
        });

    egui::Area::new(egui::Id::new("status"))
        .anchor(Align2::RIGHT_BOTTOM, [-16.0, -16.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(RichText::new(status_line(state)).size(11.0).color(CREAM.gamma_multiply(0.6)));
        });

    actions
}

/// Text for the status corner
pub fn status_line(state: &OverlayState) -> String {
    format!(
        "FPS: {:.1} | {} particles | {} photos | {}",
        state.fps, state.particle_count, state.photo_count, state.perception
    )
}
