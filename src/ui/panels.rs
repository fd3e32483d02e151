use std::sync::Arc;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::config::MAX_LOOKBACK_WEEKS;
use crate::data::loader::SourceFormat;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel. Controls are disabled while no table is loaded.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    ui.add_enabled_ui(state.loaded, |ui: &mut Ui| {
        date_controls(ui, state);
        ui.separator();
        market_controls(ui, state);
    });
}

fn date_controls(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Select Date");
    match state.selection.as_of_date {
        Some(mut date) => {
            if ui
                .add(DatePickerButton::new(&mut date).id_salt("as_of_date"))
                .changed()
            {
                state.set_as_of(date);
            }
        }
        None => {
            ui.label("No report dates.");
        }
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("◀ Week").clicked() {
            state.step_back();
        }
        if ui.small_button("Week ▶").clicked() {
            state.step_forward();
        }
        if ui.small_button("Latest").clicked() {
            state.snap_to_latest();
        }
    });

    ui.add_space(6.0);
    ui.strong("Bubble lookback");
    let mut weeks = state.selection.lookback_weeks;
    if ui
        .add(egui::Slider::new(&mut weeks, 0..=MAX_LOOKBACK_WEEKS).text("weeks"))
        .on_hover_text("0 shows every report up to the selected date")
        .changed()
    {
        state.set_lookback(weeks);
    }
}

fn market_controls(ui: &mut Ui, state: &mut AppState) {
    let table = Arc::clone(&state.table);

    ui.strong("Detail market");
    let current = state.selection.focus_market.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("focus_market")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for market in table.markets() {
                if ui.selectable_label(current == *market, market).clicked() {
                    state.set_focus_market(market);
                }
            }
        });
    ui.separator();

    let n_selected = state.selection.selected_markets.len();
    ui.strong(format!(
        "Select Commodities  ({n_selected}/{})",
        table.markets().len()
    ));
    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            state.select_all_markets();
        }
        if ui.small_button("None").clicked() {
            state.select_no_markets();
        }
    });

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for market in table.markets() {
                let mut checked = state.selection.selected_markets.contains(market);
                let text = RichText::new(market).color(state.market_colors.color_for(market));
                if ui.checkbox(&mut checked, text).changed() {
                    state.toggle_market(market);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Playback controls for the bubble chart
// ---------------------------------------------------------------------------

pub fn playback_controls(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        let label = if state.playing { "⏸ Pause" } else { "▶ Play" };
        if ui.button(label).clicked() {
            state.toggle_playback();
        }
        if let Some(date) = state.selection.as_of_date {
            ui.label(format!("As of {date}"));
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.source.is_some(), egui::Button::new("Reload"))
                .clicked()
            {
                if let Some(path) = state.source.clone() {
                    state.load_path(&path);
                }
                ui.close_menu();
            }
        });

        ui.separator();

        if state.loaded {
            let table = &state.table;
            ui.label(format!(
                "{} observations, {} markets, latest report {}",
                table.len(),
                table.markets().len(),
                table
                    .latest_date()
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            ));
        }

        if let Some(path) = &state.source {
            ui.separator();
            ui.label(RichText::new(path.display().to_string()).weak());
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open COT data")
        .add_filter("Supported files", &SourceFormat::EXTENSIONS)
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("HTML / Notebook", &["html", "htm", "ipynb"])
        .pick_file();

    if let Some(path) = file {
        state.load_path(&path);
    }
}
