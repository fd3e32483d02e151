use std::time::Instant;

use eframe::egui::{self, ScrollArea, Ui};

use crate::state::{playback_step, AppState};
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CotDashboardApp {
    pub state: AppState,
}

impl CotDashboardApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for CotDashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Bubble playback ----
        self.state.tick_playback(Instant::now());
        if self.state.playing {
            ctx.request_repaint_after(playback_step());
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.state.loaded {
                plot::error_state(ui, &self.state);
                return;
            }
            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui: &mut Ui| {
                    ui.heading("Retail vs Commercial Index");
                    panels::playback_controls(ui, &mut self.state);
                    plot::bubble_chart(ui, &self.state);
                    ui.separator();

                    ui.heading("Open Interest Index Over Time");
                    plot::open_interest_chart(ui, &self.state);
                    ui.separator();

                    ui.heading("Price and Open Interest Index Over Time");
                    plot::combined_chart(ui, &self.state);
                    ui.separator();

                    let detail_title = self
                        .state
                        .selection
                        .focus_market
                        .as_deref()
                        .map(|m| format!("{m} Detail"))
                        .unwrap_or_else(|| "Market Detail".to_string());
                    ui.heading(detail_title);
                    plot::market_detail_chart(ui, &self.state);
                    ui.separator();

                    ui.heading("Extreme Positioning");
                    plot::extremes_table(ui, &self.state);
                });
        });
    }
}
