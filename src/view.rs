//! View-models: pure functions from the current [`Selection`] to the data
//! each widget draws. Nothing here touches egui rendering; every call builds
//! fresh vectors and leaves the shared table untouched.

use chrono::NaiveDate;
use eframe::egui::Color32;

use crate::color::ColorMap;
use crate::data::filter::{
    bubble_snapshot, extremes, index_series, market_series, ExtremeRow, ExtremeThresholds,
};
use crate::data::model::CotTable;
use crate::data::schema::Field;

/// Bubble radius range in points.
pub const MIN_BUBBLE_RADIUS: f32 = 4.0;
pub const MAX_BUBBLE_RADIUS: f32 = 24.0;
/// Radius used when the table carries no open interest.
pub const DEFAULT_BUBBLE_RADIUS: f32 = 8.0;

// ---------------------------------------------------------------------------
// Selection – the state of the filter controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Cutoff date; `None` until a table with dates is loaded.
    pub as_of_date: Option<NaiveDate>,
    /// Bubble lookback in weeks, 0 for no lower bound.
    pub lookback_weeks: u32,
    /// Markets shown in the multi-market time series, in legend order.
    pub selected_markets: Vec<String>,
    /// Market shown in the single-market detail panes.
    pub focus_market: Option<String>,
}

// ---------------------------------------------------------------------------
// Time axis
// ---------------------------------------------------------------------------

/// Plot x coordinate of a date: days since the Unix epoch.
pub fn date_to_x(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

/// Inverse of [`date_to_x`], rounding to the nearest day.
pub fn x_to_date(x: f64) -> Option<NaiveDate> {
    if !x.is_finite() {
        return None;
    }
    NaiveDate::default().checked_add_signed(chrono::TimeDelta::try_days(x.round() as i64)?)
}

// ---------------------------------------------------------------------------
// View-model types
// ---------------------------------------------------------------------------

/// One bubble: retail index on x, commercial index on y.
#[derive(Debug, Clone, PartialEq)]
pub struct BubblePoint {
    pub x: f64,
    pub y: f64,
    /// Radius in points.
    pub size: f32,
    pub color: Color32,
    pub label: String,
    /// Legend group.
    pub category: String,
    /// Whether the bubble belongs to the latest report date of the snapshot.
    pub current: bool,
}

/// A named line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub color: Color32,
}

/// Price pane over OI index pane for the selected markets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedView {
    /// Empty when the table has no price column.
    pub price: Vec<Series>,
    pub open_interest: Vec<Series>,
}

/// Stacked panes for one market.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDetailView {
    pub market: String,
    /// Close, plus the 200-day moving average when present.
    pub price: Vec<Series>,
    pub open_interest: Series,
    /// `None` when the table has no RSI column.
    pub rsi: Option<Series>,
}

/// Which side of the crowding thresholds a reading sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    High,
    Low,
}

impl Extreme {
    pub fn classify(value: Option<f64>, thresholds: ExtremeThresholds) -> Option<Extreme> {
        let v = value?;
        if v >= thresholds.high {
            Some(Extreme::High)
        } else if v <= thresholds.low {
            Some(Extreme::Low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremeCell {
    pub value: Option<f64>,
    pub flag: Option<Extreme>,
}

/// A row of the flagged extremes table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeRecord {
    pub market: String,
    pub oi_index: ExtremeCell,
    pub retail_index: ExtremeCell,
    pub commercial_index: ExtremeCell,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Bubbles for the snapshot ending at the selected date.
pub fn bubble_view(table: &CotTable, selection: &Selection, colors: &ColorMap) -> Vec<BubblePoint> {
    let Some(as_of) = selection.as_of_date else {
        return Vec::new();
    };
    let rows = bubble_snapshot(table, as_of, selection.lookback_weeks);
    let latest = rows.iter().map(|r| r.date).max();
    let max_oi = rows
        .iter()
        .filter_map(|r| r.open_interest)
        .fold(0.0_f64, f64::max);

    rows.into_iter()
        .map(|r| {
            let size = match r.open_interest {
                Some(oi) if max_oi > 0.0 => {
                    let scale = (oi.max(0.0) / max_oi).sqrt() as f32;
                    MIN_BUBBLE_RADIUS + scale * (MAX_BUBBLE_RADIUS - MIN_BUBBLE_RADIUS)
                }
                _ => DEFAULT_BUBBLE_RADIUS,
            };
            BubblePoint {
                x: r.retail_index,
                y: r.commercial_index,
                size,
                color: colors.color_for(&r.category),
                label: format!("{} {}", r.market, r.date),
                current: Some(r.date) == latest,
                category: r.category,
            }
        })
        .collect()
}

fn clip(points: impl IntoIterator<Item = (NaiveDate, f64)>, as_of: Option<NaiveDate>) -> Vec<[f64; 2]> {
    points
        .into_iter()
        .filter(|(d, _)| as_of.map_or(true, |cutoff| *d <= cutoff))
        .map(|(d, v)| [date_to_x(d), v])
        .collect()
}

/// OI index lines for the selected markets, up to the selected date.
pub fn open_interest_view(table: &CotTable, selection: &Selection, colors: &ColorMap) -> Vec<Series> {
    index_series(table, &selection.selected_markets)
        .into_iter()
        .map(|s| Series {
            color: colors.color_for(&s.market),
            name: format!("{} Open Interest", s.market),
            points: clip(s.points, selection.as_of_date),
        })
        .collect()
}

/// Price and OI index panes for the selected markets, up to the selected date.
pub fn combined_view(table: &CotTable, selection: &Selection, colors: &ColorMap) -> CombinedView {
    let open_interest = open_interest_view(table, selection, colors);
    if !table.has_field(Field::Close) {
        return CombinedView {
            price: Vec::new(),
            open_interest,
        };
    }

    let mut price = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for market in &selection.selected_markets {
        if seen.contains(&market.as_str()) {
            continue;
        }
        seen.push(market);
        let points = market_series(table, market)
            .into_iter()
            .filter_map(|p| Some((p.date, p.close?)));
        price.push(Series {
            name: format!("{market} Price"),
            points: clip(points, selection.as_of_date),
            color: colors.color_for(market),
        });
    }
    CombinedView {
        price,
        open_interest,
    }
}

/// Detail panes for the focus market, up to the selected date. Panes whose
/// column the table lacks are skipped.
pub fn market_detail_view(
    table: &CotTable,
    selection: &Selection,
    colors: &ColorMap,
) -> Option<MarketDetailView> {
    let market = selection.focus_market.as_deref()?;
    let history = market_series(table, market);
    let as_of = selection.as_of_date;
    let base = colors.color_for(market);

    let mut price = Vec::new();
    if table.has_field(Field::Close) {
        price.push(Series {
            name: format!("{market} Price"),
            points: clip(history.iter().filter_map(|p| Some((p.date, p.close?))), as_of),
            color: base,
        });
    }
    if table.has_field(Field::MovingAverage200) {
        price.push(Series {
            name: "200-day MA".to_string(),
            points: clip(history.iter().filter_map(|p| Some((p.date, p.ma_200?))), as_of),
            color: Color32::LIGHT_GRAY,
        });
    }

    let open_interest = Series {
        name: format!("{market} OI Index"),
        points: clip(history.iter().filter_map(|p| Some((p.date, p.oi_index?))), as_of),
        color: base,
    };

    let rsi = table.has_field(Field::Rsi).then(|| Series {
        name: "RSI".to_string(),
        points: clip(history.iter().filter_map(|p| Some((p.date, p.rsi?))), as_of),
        color: Color32::from_rgb(180, 120, 255),
    });

    Some(MarketDetailView {
        market: market.to_string(),
        price,
        open_interest,
        rsi,
    })
}

/// Extreme readings at the latest report date, flagged per field.
pub fn extremes_view(table: &CotTable, thresholds: ExtremeThresholds) -> Vec<ExtremeRecord> {
    let cell = |value: Option<f64>| ExtremeCell {
        value,
        flag: Extreme::classify(value, thresholds),
    };
    extremes(table, thresholds)
        .into_iter()
        .map(|ExtremeRow { market, oi_index, retail_index, commercial_index }| ExtremeRecord {
            market,
            oi_index: cell(oi_index),
            retail_index: cell(retail_index),
            commercial_index: cell(commercial_index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Days;

    use super::*;
    use crate::data::model::Observation;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table() -> CotTable {
        let mut rows = Vec::new();
        for week in 0..4u64 {
            let date = day(2024, 1, 2) + Days::new(week * 7);
            for (market, oi) in [("Gold", 400_000.0), ("Silver", 100_000.0)] {
                let mut o = Observation::new(market, date);
                o.oi_index = Some(50.0 + week as f64);
                o.retail_index = Some(30.0);
                o.commercial_index = Some(70.0);
                o.open_interest = Some(oi);
                o.close = Some(100.0 + week as f64);
                rows.push(o);
            }
        }
        CotTable::from_observations(rows)
    }

    fn colors() -> ColorMap {
        ColorMap::new(["Gold", "Silver"])
    }

    fn selection(as_of: NaiveDate) -> Selection {
        Selection {
            as_of_date: Some(as_of),
            lookback_weeks: 0,
            selected_markets: vec!["Silver".into(), "Gold".into()],
            focus_market: Some("Gold".into()),
        }
    }

    #[test]
    fn test_date_axis_round_trip() {
        let d = day(2024, 1, 2);
        assert_eq!(x_to_date(date_to_x(d)), Some(d));
        assert_eq!(date_to_x(NaiveDate::default()), 0.0);
        assert_eq!(x_to_date(f64::NAN), None);
    }

    #[test]
    fn test_bubble_view_sizes_and_current_flag() {
        let table = table();
        let bubbles = bubble_view(&table, &selection(day(2024, 1, 9)), &colors());
        assert_eq!(bubbles.len(), 4);
        let gold = bubbles.iter().find(|b| b.label == "Gold 2024-01-09").unwrap();
        assert_eq!(gold.size, MAX_BUBBLE_RADIUS);
        assert!(gold.current);
        let silver = bubbles.iter().find(|b| b.label == "Silver 2024-01-09").unwrap();
        assert!(silver.size < gold.size && silver.size > MIN_BUBBLE_RADIUS);
        assert_eq!(bubbles.iter().filter(|b| b.current).count(), 2);
        assert_eq!((gold.x, gold.y), (30.0, 70.0));
        assert_eq!(gold.color, colors().color_for("Gold"));
    }

    #[test]
    fn test_bubble_view_without_date_or_rows() {
        let table = table();
        assert!(bubble_view(&table, &Selection::default(), &colors()).is_empty());
        assert!(bubble_view(&table, &selection(day(2023, 6, 1)), &colors()).is_empty());
    }

    #[test]
    fn test_open_interest_view_clips_and_orders() {
        let table = table();
        let series = open_interest_view(&table, &selection(day(2024, 1, 16)), &colors());
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Silver Open Interest", "Gold Open Interest"]);
        assert_eq!(series[1].points.len(), 3);
        let cutoff = date_to_x(day(2024, 1, 16));
        assert!(series.iter().flat_map(|s| &s.points).all(|p| p[0] <= cutoff));
    }

    #[test]
    fn test_open_interest_view_empty_selection() {
        let mut sel = selection(day(2024, 1, 16));
        sel.selected_markets.clear();
        assert!(open_interest_view(&table(), &sel, &colors()).is_empty());
    }

    #[test]
    fn test_combined_view_price_pane() {
        let view = combined_view(&table(), &selection(day(2024, 1, 30)), &colors());
        assert_eq!(view.price.len(), 2);
        assert_eq!(view.open_interest.len(), 2);
        assert_eq!(view.price[1].name, "Gold Price");
        assert_eq!(view.price[1].points.last(), Some(&[date_to_x(day(2024, 1, 23)), 103.0]));
    }

    #[test]
    fn test_market_detail_skips_missing_panes() {
        let view = market_detail_view(&table(), &selection(day(2024, 1, 30)), &colors()).unwrap();
        assert_eq!(view.market, "Gold");
        assert_eq!(view.price.len(), 1);
        assert_eq!(view.open_interest.points.len(), 4);
        assert!(view.rsi.is_none());

        let mut sel = selection(day(2024, 1, 30));
        sel.focus_market = None;
        assert!(market_detail_view(&table(), &sel, &colors()).is_none());
    }

    #[test]
    fn test_extremes_view_flags() {
        let mut gold = Observation::new("Gold", day(2024, 1, 2));
        gold.oi_index = Some(85.0);
        gold.retail_index = Some(50.0);
        gold.commercial_index = Some(20.0);
        let table = CotTable::from_observations(vec![gold]);

        let records = extremes_view(&table, ExtremeThresholds::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].oi_index.flag, Some(Extreme::High));
        assert_eq!(records[0].retail_index.flag, None);
        assert_eq!(records[0].commercial_index.flag, Some(Extreme::Low));
    }
}
