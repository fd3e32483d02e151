use eframe::egui::{Color32, RichText, Ui};
use egui_plot::{HLine, Legend, Line, LineStyle, Plot, PlotPoints, Points, VLine};

use crate::data::filter::ExtremeThresholds;
use crate::data::schema::Field;
use crate::state::AppState;
use crate::view::{date_to_x, x_to_date, Extreme, ExtremeCell, Series};

const BUBBLE_PLOT_HEIGHT: f32 = 480.0;
const SERIES_PLOT_HEIGHT: f32 = 260.0;
const PANE_PLOT_HEIGHT: f32 = 200.0;
const THRESHOLD_COLOR: Color32 = Color32::from_rgb(200, 80, 80);

// ---------------------------------------------------------------------------
// Error state
// ---------------------------------------------------------------------------

/// Shown in place of the dashboard when the source failed to load.
pub fn error_state(ui: &mut Ui, state: &AppState) {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.add_space(40.0);
        ui.heading(RichText::new("Error: Data file not found").color(Color32::RED));
        let path = state
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| state.config.data_path.display().to_string());
        ui.label(format!(
            "Please ensure {path} exists and is properly formatted, or open another file (File → Open…)."
        ));
        if let Some(msg) = &state.status_message {
            ui.add_space(8.0);
            ui.label(RichText::new(msg).weak());
        }
    });
}

// ---------------------------------------------------------------------------
// Bubble chart
// ---------------------------------------------------------------------------

/// Retail index (x) against commercial index (y), one bubble per report.
pub fn bubble_chart(ui: &mut Ui, state: &AppState) {
    let thresholds = state.config.thresholds;

    Plot::new("bubble_plot")
        .height(BUBBLE_PLOT_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Retail Index")
        .y_axis_label("Commercial Index")
        .include_x(0.0)
        .include_x(100.0)
        .include_y(0.0)
        .include_y(100.0)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for bubble in &state.views.bubbles {
                // Earlier reports fade so the selected week stands out.
                let color = if bubble.current {
                    bubble.color
                } else {
                    bubble.color.gamma_multiply(0.35)
                };
                plot_ui.points(
                    Points::new(vec![[bubble.x, bubble.y]])
                        .radius(bubble.size)
                        .color(color)
                        .filled(true)
                        .name(&bubble.category),
                );
            }
            for value in [thresholds.low, thresholds.high] {
                plot_ui.vline(VLine::new(value).color(THRESHOLD_COLOR).style(LineStyle::dashed_loose()));
                plot_ui.hline(HLine::new(value).color(THRESHOLD_COLOR).style(LineStyle::dashed_loose()));
            }
        });

    if state.views.bubbles.is_empty() {
        ui.label(RichText::new("No reports on or before the selected date.").weak());
    }
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Shared x range for all time panes: first report to the selected date.
fn time_bounds(state: &AppState) -> Option<(f64, f64)> {
    let first = state.table.first_date()?;
    let last = state.selection.as_of_date.or(state.table.latest_date())?;
    Some((date_to_x(first), date_to_x(last.max(first))))
}

fn format_date_axis(x: f64) -> String {
    x_to_date(x).map(|d| d.to_string()).unwrap_or_default()
}

/// Draw a set of lines with markers on a date axis.
fn series_plot(
    ui: &mut Ui,
    id: &str,
    series: &[Series],
    y_label: &str,
    height: f32,
    bounds: Option<(f64, f64)>,
    reference_lines: &[f64],
) {
    let mut plot = Plot::new(id)
        .height(height)
        .legend(Legend::default())
        .y_axis_label(y_label)
        .x_axis_formatter(|mark, _range| format_date_axis(mark.value))
        .label_formatter(|name, value| {
            let date = format_date_axis(value.x);
            if name.is_empty() {
                format!("{date}\n{:.2}", value.y)
            } else {
                format!("{name}\n{date}\n{:.2}", value.y)
            }
        })
        .allow_scroll(false);
    if let Some((lo, hi)) = bounds {
        plot = plot.include_x(lo).include_x(hi);
    }

    plot.show(ui, |plot_ui| {
        for s in series {
            let line: PlotPoints = s.points.iter().copied().collect();
            plot_ui.line(Line::new(line).name(&s.name).color(s.color).width(1.5));
            let markers: PlotPoints = s.points.iter().copied().collect();
            plot_ui.points(Points::new(markers).radius(2.0).color(s.color));
        }
        for &y in reference_lines {
            plot_ui.hline(HLine::new(y).color(THRESHOLD_COLOR).style(LineStyle::dashed_loose()));
        }
    });
}

/// Open interest index of every selected market.
pub fn open_interest_chart(ui: &mut Ui, state: &AppState) {
    if state.views.open_interest.is_empty() {
        ui.label(RichText::new("Select one or more commodities.").weak());
        return;
    }
    let t = state.config.thresholds;
    series_plot(
        ui,
        "open_interest_plot",
        &state.views.open_interest,
        "Open Interest Index",
        SERIES_PLOT_HEIGHT,
        time_bounds(state),
        &[t.low, t.high],
    );
}

/// Price pane above the OI index pane for the selected markets.
pub fn combined_chart(ui: &mut Ui, state: &AppState) {
    let combined = &state.views.combined;
    if combined.open_interest.is_empty() {
        ui.label(RichText::new("Select one or more commodities.").weak());
        return;
    }
    let bounds = time_bounds(state);
    if combined.price.is_empty() {
        ui.label(RichText::new("No price column in this dataset.").weak());
    } else {
        ui.label("Price");
        series_plot(ui, "combined_price", &combined.price, "Price", PANE_PLOT_HEIGHT, bounds, &[]);
    }
    ui.label("Open Interest Index");
    series_plot(
        ui,
        "combined_oi",
        &combined.open_interest,
        "Open Interest Index",
        PANE_PLOT_HEIGHT,
        bounds,
        &[],
    );
}

/// Price / OI index / RSI panes for the detail market.
pub fn market_detail_chart(ui: &mut Ui, state: &AppState) {
    let Some(detail) = &state.views.detail else {
        ui.label(RichText::new("Pick a detail market.").weak());
        return;
    };
    let bounds = time_bounds(state);
    let t = state.config.thresholds;
    let id = |pane: &str| format!("detail_{pane}");

    if !detail.price.is_empty() {
        series_plot(ui, &id("price"), &detail.price, "Price", PANE_PLOT_HEIGHT, bounds, &[]);
    }
    series_plot(
        ui,
        &id("oi"),
        std::slice::from_ref(&detail.open_interest),
        "OI Index",
        PANE_PLOT_HEIGHT,
        bounds,
        &[t.low, t.high],
    );
    if let Some(rsi) = &detail.rsi {
        series_plot(
            ui,
            &id("rsi"),
            std::slice::from_ref(rsi),
            "RSI",
            PANE_PLOT_HEIGHT,
            bounds,
            &[30.0, 70.0],
        );
    }
}

// ---------------------------------------------------------------------------
// Extremes table
// ---------------------------------------------------------------------------

fn extreme_cell(ui: &mut Ui, cell: &ExtremeCell) {
    let text = cell
        .value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "–".to_string());
    let rich = match cell.flag {
        Some(Extreme::High) => RichText::new(text).color(Color32::from_rgb(80, 200, 120)).strong(),
        Some(Extreme::Low) => RichText::new(text).color(Color32::from_rgb(230, 90, 90)).strong(),
        None => RichText::new(text),
    };
    ui.label(rich);
}

/// Markets with an extreme reading at the latest report date.
pub fn extremes_table(ui: &mut Ui, state: &AppState) {
    let ExtremeThresholds { high, low } = state.config.thresholds;
    let latest = state
        .table
        .latest_date()
        .map(|d| d.to_string())
        .unwrap_or_default();
    ui.label(format!("Readings ≥ {high} or ≤ {low} on {latest}"));

    if state.views.extremes.is_empty() {
        ui.label(RichText::new("No extreme readings.").weak());
        return;
    }

    eframe::egui::Grid::new("extremes_table")
        .striped(true)
        .num_columns(4)
        .show(ui, |ui: &mut Ui| {
            for field in [Field::Market, Field::OiIndex, Field::RetailIndex, Field::CommercialIndex] {
                ui.strong(field.label());
            }
            ui.end_row();

            for record in &state.views.extremes {
                ui.label(&record.market);
                extreme_cell(ui, &record.oi_index);
                extreme_cell(ui, &record.retail_index);
                extreme_cell(ui, &record.commercial_index);
                ui.end_row();
            }
        });
}
