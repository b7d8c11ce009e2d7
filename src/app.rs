use std::time::{Duration, Instant};

use eframe::egui;

use crate::state::AppState;
use crate::ui::{UiState, panels, plot};

/// Repaint interval while no task is running.
const IDLE_REPAINT: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FiberXApp {
    pub state: AppState,
    pub view: UiState,
}

impl FiberXApp {
    pub fn new(state: AppState) -> Self {
        let view = UiState::new(&state.settings);
        Self { state, view }
    }
}

impl Default for FiberXApp {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl eframe::App for FiberXApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Timers: device read and feature tick ----
        let wakeup = self.state.poll(Instant::now());

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state, &mut self.view);
        });

        // ---- Left side panel: controls ----
        egui::SidePanel::left("control_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state, &mut self.view);
            });

        // ---- Central panel: plots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::central_plots(ui, &self.state, &mut self.view);
        });

        ctx.request_repaint_after(wakeup.unwrap_or(IDLE_REPAINT));
    }
}
