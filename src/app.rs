use eframe::egui;

use crate::data::io;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct WavePickApp {
    pub state: AppState,
}

impl Default for WavePickApp {
    fn default() -> Self {
        Self {
            state: AppState::default(),
        }
    }
}

impl eframe::App for WavePickApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // React to model mutations queued since the last frame.
        self.state.process_changes();

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: phases, events, stations, filter ----
        egui::SidePanel::left("pick_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: waveform plots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::waveform_plots(ui, &mut self.state);
        });
    }

    /// Session backup of the active picks on normal close.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = io::write_backup(&self.state.registry) {
            log::warn!("Could not write pick backup: {e:#}");
        }
    }
}
