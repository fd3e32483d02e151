use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;

use super::schema::Field;

// ---------------------------------------------------------------------------
// CellValue – a single raw cell read from a source file
// ---------------------------------------------------------------------------

/// A dynamically-typed cell as it comes out of a JSON/CSV/HTML/Parquet source,
/// before the schema mapping turns it into an [`Observation`] field.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Already-typed calendar date (Parquet `Date32` / timestamp columns).
    Date(NaiveDate),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Numeric view of the cell. Strings are parsed leniently (thousands
    /// separators and surrounding whitespace are ignored) because HTML and
    /// CSV exports carry numbers as text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if v.is_finite() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    /// Textual view, used for market names and group labels.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Date(d) => Some(d.to_string()),
            CellValue::Null => None,
        }
    }
}

/// One raw source row: column name → cell.
pub type RawRecord = BTreeMap<String, CellValue>;

// ---------------------------------------------------------------------------
// Observation – one market on one reporting date
// ---------------------------------------------------------------------------

/// A single COT observation (one row of the source table).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub market: String,
    pub date: NaiveDate,
    pub oi_index: Option<f64>,
    pub retail_index: Option<f64>,
    pub commercial_index: Option<f64>,
    /// Absolute open interest (contracts). Sizes the bubbles.
    pub open_interest: Option<f64>,
    pub close: Option<f64>,
    pub ma_200: Option<f64>,
    pub rsi: Option<f64>,
    /// Categorical bucket used for bubble colouring.
    pub group: Option<String>,
}

impl Observation {
    /// An observation with only its key set.
    pub fn new(market: impl Into<String>, date: NaiveDate) -> Self {
        Observation {
            market: market.into(),
            date,
            oi_index: None,
            retail_index: None,
            commercial_index: None,
            open_interest: None,
            close: None,
            ma_200: None,
            rsi: None,
            group: None,
        }
    }

    /// Numeric value of a field, `None` for absent values and non-numeric fields.
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::OiIndex => self.oi_index,
            Field::RetailIndex => self.retail_index,
            Field::CommercialIndex => self.commercial_index,
            Field::OpenInterest => self.open_interest,
            Field::Close => self.close,
            Field::MovingAverage200 => self.ma_200,
            Field::Rsi => self.rsi,
            Field::Market | Field::Date | Field::Group => None,
        }
    }

    /// Store a numeric value into the matching slot. Non-numeric fields are ignored.
    pub fn set_value(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::OiIndex => &mut self.oi_index,
            Field::RetailIndex => &mut self.retail_index,
            Field::CommercialIndex => &mut self.commercial_index,
            Field::OpenInterest => &mut self.open_interest,
            Field::Close => &mut self.close,
            Field::MovingAverage200 => &mut self.ma_200,
            Field::Rsi => &mut self.rsi,
            Field::Market | Field::Date | Field::Group => return,
        };
        *slot = Some(value);
    }

    /// Whether this observation carries anything beyond its key.
    pub fn has_any_value(&self) -> bool {
        Field::NUMERIC.iter().any(|f| self.value(*f).is_some()) || self.group.is_some()
    }
}

// ---------------------------------------------------------------------------
// CotTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed table with pre-computed indices. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CotTable {
    /// Rows sorted by `(date, market)`; `(market, date)` is unique.
    rows: Vec<Observation>,
    /// Sorted unique market names.
    markets: Vec<String>,
    /// Sorted unique report dates.
    dates: Vec<NaiveDate>,
    /// Optional fields carried by at least one row.
    fields: BTreeSet<Field>,
    /// Number of `(market, date)` duplicates dropped during construction.
    duplicates: usize,
}

impl CotTable {
    /// Build the table and its indices. Later duplicates of a
    /// `(market, date)` key replace earlier ones.
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let mut by_key: BTreeMap<(NaiveDate, String), Observation> = BTreeMap::new();
        let mut duplicates = 0;
        for obs in observations {
            if by_key
                .insert((obs.date, obs.market.clone()), obs)
                .is_some()
            {
                duplicates += 1;
            }
        }

        let rows: Vec<Observation> = by_key.into_values().collect();
        let markets: BTreeSet<String> = rows.iter().map(|r| r.market.clone()).collect();
        let dates: BTreeSet<NaiveDate> = rows.iter().map(|r| r.date).collect();

        let mut fields = BTreeSet::new();
        for row in &rows {
            for field in Field::NUMERIC {
                if row.value(field).is_some() {
                    fields.insert(field);
                }
            }
            if row.group.is_some() {
                fields.insert(Field::Group);
            }
        }

        CotTable {
            rows,
            markets: markets.into_iter().collect(),
            dates: dates.into_iter().collect(),
            fields,
            duplicates,
        }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn markets(&self) -> &[String] {
        &self.markets
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Whether any row has a value for `field`.
    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn contains_market(&self, market: &str) -> bool {
        self.markets.binary_search_by(|m| m.as_str().cmp(market)).is_ok()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }

    /// Number of index readings outside the nominal [0, 100] range.
    pub fn out_of_range_indices(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| [r.oi_index, r.retail_index, r.commercial_index])
            .flatten()
            .filter(|v| !(0.0..=100.0).contains(v))
            .count()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rows_sorted_and_indexed() {
        let mut silver = Observation::new("Silver", day(2024, 1, 9));
        silver.oi_index = Some(40.0);
        let mut gold = Observation::new("Gold", day(2024, 1, 2));
        gold.oi_index = Some(60.0);
        gold.rsi = Some(55.0);

        let table = CotTable::from_observations(vec![silver, gold]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].market, "Gold");
        assert_eq!(table.markets(), ["Gold".to_string(), "Silver".to_string()]);
        assert_eq!(table.dates(), [day(2024, 1, 2), day(2024, 1, 9)]);
        assert!(table.has_field(Field::Rsi));
        assert!(!table.has_field(Field::MovingAverage200));
        assert!(table.contains_market("Silver"));
        assert!(!table.contains_market("Copper"));
    }

    #[test]
    fn test_duplicate_key_keeps_last() {
        let mut first = Observation::new("Gold", day(2024, 1, 2));
        first.oi_index = Some(10.0);
        let mut second = Observation::new("Gold", day(2024, 1, 2));
        second.oi_index = Some(90.0);

        let table = CotTable::from_observations(vec![first, second]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.duplicates_dropped(), 1);
        assert_eq!(table.rows()[0].oi_index, Some(90.0));
    }

    #[test]
    fn test_out_of_range_counted_not_rejected() {
        let mut obs = Observation::new("Gold", day(2024, 1, 2));
        obs.oi_index = Some(104.0);
        obs.retail_index = Some(-3.0);
        obs.commercial_index = Some(50.0);
        let table = CotTable::from_observations(vec![obs]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.out_of_range_indices(), 2);
    }

    #[test]
    fn test_empty_table() {
        let table = CotTable::default();
        assert!(table.is_empty());
        assert_eq!(table.latest_date(), None);
        assert!(table.markets().is_empty());
    }

    #[test]
    fn test_cell_value_numeric_parsing() {
        assert_eq!(CellValue::String(" 1,234.5 ".into()).as_f64(), Some(1234.5));
        assert_eq!(CellValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(CellValue::String("n/a".into()).as_f64(), None);
        assert_eq!(CellValue::Float(f64::NAN).as_f64(), None);
        assert_eq!(CellValue::String("  ".into()).as_text(), None);
    }
}
