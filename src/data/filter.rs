use chrono::{Days, NaiveDate};

use super::model::{CotTable, Observation};
use super::schema::Field;

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// One row of the bubble snapshot: retail (x) against commercial (y),
/// sized by open interest and coloured by category.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleRow {
    pub market: String,
    pub date: NaiveDate,
    pub retail_index: f64,
    pub commercial_index: f64,
    pub open_interest: Option<f64>,
    /// `group` when the table has one, otherwise the market name.
    pub category: String,
}

/// One point of a single-market series.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub oi_index: Option<f64>,
    pub ma_200: Option<f64>,
    pub rsi: Option<f64>,
}

/// The open-interest index history of one market.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSeries {
    pub market: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// A row of the extremes summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeRow {
    pub market: String,
    pub oi_index: Option<f64>,
    pub retail_index: Option<f64>,
    pub commercial_index: Option<f64>,
}

/// Crowding thresholds. Readings `>= high` or `<= low` are extreme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremeThresholds {
    pub high: f64,
    pub low: f64,
}

impl Default for ExtremeThresholds {
    fn default() -> Self {
        ExtremeThresholds {
            high: 80.0,
            low: 20.0,
        }
    }
}

impl ExtremeThresholds {
    pub fn is_extreme(&self, value: f64) -> bool {
        value >= self.high || value <= self.low
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Rows reported on or before `as_of`, and within `lookback_weeks` of it when
/// the lookback is non-zero. Rows missing either positioning index are left
/// out since they cannot be placed on the chart.
pub fn bubble_snapshot(table: &CotTable, as_of: NaiveDate, lookback_weeks: u32) -> Vec<BubbleRow> {
    let lower = lookback_start(as_of, lookback_weeks);
    let use_group = table.has_field(Field::Group);

    table
        .rows()
        .iter()
        .filter(|r| r.date <= as_of && lower.map_or(true, |lo| r.date >= lo))
        .filter_map(|r| {
            Some(BubbleRow {
                market: r.market.clone(),
                date: r.date,
                retail_index: r.retail_index?,
                commercial_index: r.commercial_index?,
                open_interest: r.open_interest,
                category: category_of(r, use_group),
            })
        })
        .collect()
}

/// Earliest date inside a lookback window, `None` for an unbounded window.
pub fn lookback_start(as_of: NaiveDate, lookback_weeks: u32) -> Option<NaiveDate> {
    if lookback_weeks == 0 {
        return None;
    }
    as_of.checked_sub_days(Days::new(u64::from(lookback_weeks) * 7))
}

fn category_of(row: &Observation, use_group: bool) -> String {
    if use_group {
        row.group.clone().unwrap_or_else(|| "Other".to_string())
    } else {
        row.market.clone()
    }
}

/// Full history of one market in ascending date order.
pub fn market_series(table: &CotTable, market: &str) -> Vec<MarketPoint> {
    // Rows are already sorted by date.
    table
        .rows()
        .iter()
        .filter(|r| r.market == market)
        .map(|r| MarketPoint {
            date: r.date,
            close: r.close,
            oi_index: r.oi_index,
            ma_200: r.ma_200,
            rsi: r.rsi,
        })
        .collect()
}

/// Open-interest index history for each requested market, in request order.
/// Repeated markets are returned once; unknown markets get an empty series.
pub fn index_series(table: &CotTable, markets: &[String]) -> Vec<IndexSeries> {
    let mut out: Vec<IndexSeries> = Vec::with_capacity(markets.len());
    for market in markets {
        if out.iter().any(|s| &s.market == market) {
            continue;
        }
        let points = table
            .rows()
            .iter()
            .filter(|r| &r.market == market)
            .filter_map(|r| Some((r.date, r.oi_index?)))
            .collect();
        out.push(IndexSeries {
            market: market.clone(),
            points,
        });
    }
    out
}

/// Markets at the most recent report date with at least one extreme index.
pub fn extremes(table: &CotTable, thresholds: ExtremeThresholds) -> Vec<ExtremeRow> {
    let Some(latest) = table.latest_date() else {
        return Vec::new();
    };

    table
        .rows()
        .iter()
        .filter(|r| r.date == latest)
        .filter(|r| {
            [r.oi_index, r.retail_index, r.commercial_index]
                .into_iter()
                .flatten()
                .any(|v| thresholds.is_extreme(v))
        })
        .map(|r| ExtremeRow {
            market: r.market.clone(),
            oi_index: r.oi_index,
            retail_index: r.retail_index,
            commercial_index: r.commercial_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(market: &str, date: NaiveDate, oi: f64, retail: f64, commercial: f64) -> Observation {
        let mut o = Observation::new(market, date);
        o.oi_index = Some(oi);
        o.retail_index = Some(retail);
        o.commercial_index = Some(commercial);
        o
    }

    fn weekly_table() -> CotTable {
        let mut rows = Vec::new();
        for week in 0..8u64 {
            let date = day(2024, 1, 2) + Days::new(week * 7);
            rows.push(obs("Gold", date, 50.0 + week as f64, 40.0, 60.0));
            rows.push(obs("Silver", date, 30.0, 45.0, 55.0));
        }
        CotTable::from_observations(rows)
    }

    fn single(oi: f64) -> CotTable {
        CotTable::from_observations(vec![obs("Gold", day(2024, 1, 2), oi, 50.0, 50.0)])
    }

    #[test]
    fn test_bubble_snapshot_respects_cutoff() {
        let table = weekly_table();
        let as_of = day(2024, 1, 23);
        let rows = bubble_snapshot(&table, as_of, 0);
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.date <= as_of));
    }

    #[test]
    fn test_bubble_snapshot_lookback_window() {
        let table = weekly_table();
        let as_of = day(2024, 2, 13);
        let rows = bubble_snapshot(&table, as_of, 2);
        let lower = day(2024, 1, 30);
        assert!(rows.iter().all(|r| r.date <= as_of && r.date >= lower));
        // Weeks of Jan 30, Feb 6 and Feb 13 for two markets.
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn test_bubble_snapshot_before_first_date_is_empty() {
        let table = weekly_table();
        assert!(bubble_snapshot(&table, day(2023, 12, 1), 0).is_empty());
        assert!(bubble_snapshot(&CotTable::default(), day(2024, 1, 1), 4).is_empty());
    }

    #[test]
    fn test_bubble_category_uses_group_when_present() {
        let mut gold = obs("Gold", day(2024, 1, 2), 50.0, 40.0, 60.0);
        gold.group = Some("Metals".into());
        let corn = obs("Corn", day(2024, 1, 2), 50.0, 40.0, 60.0);
        let table = CotTable::from_observations(vec![gold, corn]);
        let rows = bubble_snapshot(&table, day(2024, 1, 2), 0);
        let categories: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, ["Other", "Metals"]);

        let plain = weekly_table();
        let rows = bubble_snapshot(&plain, day(2024, 1, 2), 0);
        assert_eq!(rows[0].category, rows[0].market);
    }

    #[test]
    fn test_market_series_sorted_and_unknown_empty() {
        let table = weekly_table();
        let series = market_series(&table, "Gold");
        assert_eq!(series.len(), 8);
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(series[7].oi_index, Some(57.0));
        assert!(market_series(&table, "Platinum").is_empty());
    }

    #[test]
    fn test_index_series_preserves_request_order() {
        let table = weekly_table();
        let request = vec!["Silver".to_string(), "Gold".to_string(), "Silver".to_string()];
        let series = index_series(&table, &request);
        let names: Vec<&str> = series.iter().map(|s| s.market.as_str()).collect();
        assert_eq!(names, ["Silver", "Gold"]);
        assert_eq!(series[1].points.len(), 8);
    }

    #[test]
    fn test_index_series_empty_request_and_unknown_market() {
        let table = weekly_table();
        assert!(index_series(&table, &[]).is_empty());
        let series = index_series(&table, &["Lumber".to_string()]);
        assert_eq!(series.len(), 1);
        assert!(series[0].points.is_empty());
    }

    #[test]
    fn test_extremes_upper_boundary() {
        assert_eq!(extremes(&single(81.0), ExtremeThresholds::default()).len(), 1);
        assert_eq!(extremes(&single(80.0), ExtremeThresholds::default()).len(), 1);
        assert!(extremes(&single(79.9999), ExtremeThresholds::default()).is_empty());
        assert!(extremes(&single(79.0), ExtremeThresholds::default()).is_empty());
    }

    #[test]
    fn test_extremes_lower_boundary() {
        assert_eq!(extremes(&single(20.0), ExtremeThresholds::default()).len(), 1);
        assert!(extremes(&single(20.0001), ExtremeThresholds::default()).is_empty());
        assert!(extremes(&single(21.0), ExtremeThresholds::default()).is_empty());
    }

    #[test]
    fn test_extremes_custom_thresholds() {
        let tight = ExtremeThresholds {
            high: 70.0,
            low: 30.0,
        };
        assert_eq!(extremes(&single(72.0), tight).len(), 1);
        assert!(extremes(&single(72.0), ExtremeThresholds::default()).is_empty());
    }

    #[test]
    fn test_extremes_gold_and_silver_scenario() {
        let table = CotTable::from_observations(vec![
            obs("Gold", day(2024, 1, 2), 85.0, 50.0, 50.0),
            obs("Silver", day(2024, 1, 2), 10.0, 50.0, 50.0),
        ]);
        let rows = extremes(&table, ExtremeThresholds::default());
        assert_eq!(
            rows,
            vec![
                ExtremeRow {
                    market: "Gold".into(),
                    oi_index: Some(85.0),
                    retail_index: Some(50.0),
                    commercial_index: Some(50.0),
                },
                ExtremeRow {
                    market: "Silver".into(),
                    oi_index: Some(10.0),
                    retail_index: Some(50.0),
                    commercial_index: Some(50.0),
                },
            ]
        );
    }

    #[test]
    fn test_extremes_only_latest_date() {
        let table = CotTable::from_observations(vec![
            obs("Gold", day(2024, 1, 2), 95.0, 50.0, 50.0),
            obs("Gold", day(2024, 1, 9), 50.0, 50.0, 50.0),
            obs("Copper", day(2024, 1, 9), 50.0, 15.0, 50.0),
        ]);
        let rows = extremes(&table, ExtremeThresholds::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].market, "Copper");
        assert!(extremes(&CotTable::default(), ExtremeThresholds::default()).is_empty());
    }
}
