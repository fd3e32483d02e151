use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::model::{CellValue, CotTable, Observation, RawRecord};

/// Market name given to unprefixed field columns of a wide source.
pub const AGGREGATE_MARKET: &str = "All";

// ---------------------------------------------------------------------------
// Field – logical column of the COT schema
// ---------------------------------------------------------------------------

/// Logical field of an observation. Source column names are resolved to a
/// `Field` once at load time; nothing downstream looks at raw column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Market,
    Date,
    OiIndex,
    RetailIndex,
    CommercialIndex,
    OpenInterest,
    Close,
    MovingAverage200,
    Rsi,
    Group,
}

impl Field {
    /// Fields holding numbers, in display order.
    pub const NUMERIC: [Field; 7] = [
        Field::OiIndex,
        Field::RetailIndex,
        Field::CommercialIndex,
        Field::OpenInterest,
        Field::Close,
        Field::MovingAverage200,
        Field::Rsi,
    ];

    /// The three positioning indices.
    pub const INDICES: [Field; 3] = [Field::OiIndex, Field::RetailIndex, Field::CommercialIndex];

    /// Resolve a source column name. Matching ignores case, whitespace and
    /// punctuation, so `OI_Index`, `oi index` and `Open_Interest_Index` agree.
    pub fn from_column(name: &str) -> Option<Field> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let field = match key.as_str() {
            "market" | "commodity" | "marketname" => Field::Market,
            "date" | "reportdate" | "asofdate" => Field::Date,
            "oiindex" | "openinterestindex" => Field::OiIndex,
            "retailindex" => Field::RetailIndex,
            "commercialindex" => Field::CommercialIndex,
            "openinterest" | "oi" => Field::OpenInterest,
            "close" | "price" => Field::Close,
            "200daymovingaverage" | "ma200" | "sma200" | "movingaverage200" => {
                Field::MovingAverage200
            }
            "rsi" => Field::Rsi,
            "group" | "sector" => Field::Group,
            _ => return None,
        };
        Some(field)
    }

    /// Canonical display label.
    pub fn label(self) -> &'static str {
        match self {
            Field::Market => "Market",
            Field::Date => "Date",
            Field::OiIndex => "OI Index",
            Field::RetailIndex => "Retail Index",
            Field::CommercialIndex => "Commercial Index",
            Field::OpenInterest => "Open Interest",
            Field::Close => "Price",
            Field::MovingAverage200 => "200-day MA",
            Field::Rsi => "RSI",
            Field::Group => "Group",
        }
    }

    pub fn is_numeric(self) -> bool {
        Field::NUMERIC.contains(&self)
    }
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Split a wide-format column such as `Gold_Open_Interest_Index` or
/// `Crude_Oil_Price` into its market prefix and field. The leftmost split
/// whose suffix names a numeric field wins.
pub fn split_wide_column(column: &str) -> Option<(String, Field)> {
    for (idx, _) in column.match_indices('_') {
        let prefix = column[..idx].trim();
        if prefix.is_empty() {
            continue;
        }
        if let Some(field) = Field::from_column(&column[idx + 1..]) {
            if field.is_numeric() {
                return Some((prefix.to_string(), field));
            }
        }
    }
    None
}

/// Table layout detected from the column set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per market and date, with a market column.
    Tall,
    /// One row per date; `<Market>_<Field>` columns per market.
    Wide,
}

/// Source column → logical field mapping, validated once per load.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub layout: Layout,
    /// Columns that map directly to a field.
    direct: BTreeMap<String, Field>,
    /// Wide columns: column → (market, field).
    per_market: BTreeMap<String, (String, Field)>,
    date_column: Option<String>,
}

impl ColumnMap {
    /// Resolve every column name and check the required ones are present.
    /// `has_fallback_date` allows sources without a date column (HTML snapshots).
    pub fn resolve<'a>(
        columns: impl IntoIterator<Item = &'a str>,
        has_fallback_date: bool,
    ) -> Result<Self> {
        let mut direct = BTreeMap::new();
        let mut per_market = BTreeMap::new();
        let mut date_column = None;

        for column in columns {
            if let Some(field) = Field::from_column(column) {
                if field == Field::Date && date_column.is_none() {
                    date_column = Some(column.to_string());
                }
                direct.insert(column.to_string(), field);
            } else if let Some((market, field)) = split_wide_column(column) {
                per_market.insert(column.to_string(), (market, field));
            }
        }

        let layout = if direct.values().any(|f| *f == Field::Market) {
            Layout::Tall
        } else {
            Layout::Wide
        };

        if date_column.is_none() && !has_fallback_date {
            bail!("missing required column 'Date'");
        }

        let index_columns = match layout {
            Layout::Tall => direct.values().filter(|f| Field::INDICES.contains(f)).count(),
            Layout::Wide => {
                direct.values().filter(|f| Field::INDICES.contains(f)).count()
                    + per_market
                        .values()
                        .filter(|(_, f)| Field::INDICES.contains(f))
                        .count()
            }
        };
        if index_columns == 0 {
            bail!("no index columns found (expected OI_Index, Retail_Index or Commercial_Index)");
        }

        Ok(ColumnMap {
            layout,
            direct,
            per_market,
            date_column,
        })
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Coerce a cell into a calendar date. Numbers are epoch milliseconds
/// (pandas' default JSON date encoding); strings may be ISO dates or datetimes.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Integer(ms) => date_from_millis(*ms),
        CellValue::Float(ms) if ms.is_finite() => date_from_millis(*ms as i64),
        CellValue::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn date_from_millis(ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d);
    }
    s.parse::<i64>().ok().and_then(date_from_millis)
}

// ---------------------------------------------------------------------------
// Records → CotTable
// ---------------------------------------------------------------------------

/// Summary of a conversion, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub records: usize,
    pub skipped: usize,
}

/// Turn raw records into a [`CotTable`] through the schema mapping.
///
/// Rows without a usable market or date are skipped and counted; a source
/// with records but no usable rows is malformed.
pub fn build_table(
    records: &[RawRecord],
    fallback_date: Option<NaiveDate>,
) -> Result<(CotTable, Layout, BuildStats)> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }
    if records.is_empty() {
        return Ok((CotTable::default(), Layout::Tall, BuildStats::default()));
    }

    let map = ColumnMap::resolve(columns, fallback_date.is_some())?;
    let mut observations = Vec::with_capacity(records.len());
    let mut stats = BuildStats {
        records: records.len(),
        skipped: 0,
    };

    for record in records {
        let date = map
            .date_column
            .as_ref()
            .and_then(|col| record.get(col))
            .and_then(parse_date)
            .or(fallback_date);
        let Some(date) = date else {
            stats.skipped += 1;
            continue;
        };

        match map.layout {
            Layout::Tall => match tall_observation(record, &map, date) {
                Some(obs) => observations.push(obs),
                None => stats.skipped += 1,
            },
            Layout::Wide => observations.extend(wide_observations(record, &map, date)),
        }
    }

    if observations.is_empty() {
        bail!("no usable rows in {} records", records.len());
    }

    Ok((CotTable::from_observations(observations), map.layout, stats))
}

fn tall_observation(record: &RawRecord, map: &ColumnMap, date: NaiveDate) -> Option<Observation> {
    let market = map
        .direct
        .iter()
        .find(|(_, f)| **f == Field::Market)
        .and_then(|(col, _)| record.get(col))
        .and_then(CellValue::as_text)?;

    let mut obs = Observation::new(market, date);
    for (col, field) in &map.direct {
        let Some(cell) = record.get(col) else {
            continue;
        };
        apply_cell(&mut obs, *field, cell);
    }
    Some(obs)
}

fn wide_observations(record: &RawRecord, map: &ColumnMap, date: NaiveDate) -> Vec<Observation> {
    let mut by_market: BTreeMap<String, Observation> = BTreeMap::new();

    for (col, field) in &map.direct {
        if let Some(cell) = record.get(col) {
            if field.is_numeric() || *field == Field::Group {
                let obs = by_market
                    .entry(AGGREGATE_MARKET.to_string())
                    .or_insert_with(|| Observation::new(AGGREGATE_MARKET, date));
                apply_cell(obs, *field, cell);
            }
        }
    }
    for (col, (market, field)) in &map.per_market {
        if let Some(cell) = record.get(col) {
            let obs = by_market
                .entry(market.clone())
                .or_insert_with(|| Observation::new(market.clone(), date));
            apply_cell(obs, *field, cell);
        }
    }

    by_market
        .into_values()
        .filter(Observation::has_any_value)
        .collect()
}

fn apply_cell(obs: &mut Observation, field: Field, cell: &CellValue) {
    if field == Field::Group {
        obs.group = cell.as_text();
    } else if field.is_numeric() {
        if let Some(v) = cell.as_f64() {
            obs.set_value(field, v);
        }
    }
}
