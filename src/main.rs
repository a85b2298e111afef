mod app;
mod color;
mod state;
mod ui;

use app::CropYieldApp;
use crop_yield_dash::config::AppConfig;
use crop_yield_dash::workspace::Workspace;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}, falling back to defaults");
            AppConfig::default()
        }
    };
    let workspace = Workspace::load(config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Crop Yield Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(CropYieldApp::new(workspace)))),
    )
}
