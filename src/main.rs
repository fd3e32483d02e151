mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;
mod view;

use app::CotDashboardApp;
use clap::Parser;
use config::{Cli, DashboardConfig, WINDOW_MIN_SIZE, WINDOW_SIZE};
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("Parsed arguments: {cli:?}");
    let config = match DashboardConfig::try_from(cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    let data_path = config.data_path.clone();
    let mut state = AppState::new(config);
    state.load_path(&data_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(WINDOW_SIZE)
            .with_min_inner_size(WINDOW_MIN_SIZE),
        ..Default::default()
    };

    eframe::run_native(
        "COT Futures Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(CotDashboardApp::new(state)))),
    )
}
