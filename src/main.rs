use eframe::egui;

use fiberx::app::FiberXApp;
use fiberx::config::Settings;
use fiberx::device::SimulatedSpectrometer;
use fiberx::state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(&settings_path);
    let state = AppState::new(settings, settings_path, SimulatedSpectrometer::default());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "FiberX – Transmission Monitor",
        options,
        Box::new(|_cc| Ok(Box::new(FiberXApp::new(state)))),
    )
}
