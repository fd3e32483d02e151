use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{CellValue, CotTable, RawRecord};
use super::schema::{build_table, split_wide_column, Field};

/// Column order assumed for notebook HTML tables whose header is not recognised.
pub const POSITIONAL_HTML_COLUMNS: [&str; 4] =
    ["Market", "OI_Index", "Retail_Index", "Commercial_Index"];

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("data source {path} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("data source {path} is malformed: {reason}")]
    SourceMalformed { path: PathBuf, reason: String },
    #[error("unsupported file extension '.{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },
}

impl LoadError {
    fn malformed(path: &Path, err: anyhow::Error) -> Self {
        LoadError::SourceMalformed {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        }
    }

    fn unavailable(path: &Path, source: std::io::Error) -> Self {
        LoadError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of [`load`]: always a table, plus whether it came from the source.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: Arc<CotTable>,
    pub loaded: bool,
    pub error: Option<LoadError>,
}

/// Loader knobs.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Date stamped on rows of sources without a date column (HTML snapshots).
    /// `None` means today.
    pub snapshot_date: Option<NaiveDate>,
}

impl LoaderOptions {
    fn snapshot_date(&self) -> NaiveDate {
        self.snapshot_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Supported source formats, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Html,
    Notebook,
    Json,
    Csv,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(SourceFormat::Html),
            "ipynb" => Some(SourceFormat::Notebook),
            "json" => Some(SourceFormat::Json),
            "csv" => Some(SourceFormat::Csv),
            "parquet" | "pq" => Some(SourceFormat::Parquet),
            _ => None,
        }
    }

    /// Extensions accepted by the open dialog.
    pub const EXTENSIONS: [&'static str; 7] =
        ["json", "csv", "parquet", "pq", "html", "htm", "ipynb"];
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a COT table, never failing: errors are logged and reported through
/// `loaded = false` with an empty table.
pub fn load(path: &Path, options: &LoaderOptions) -> LoadOutcome {
    match load_file(path, options) {
        Ok(table) => LoadOutcome {
            table: Arc::new(table),
            loaded: true,
            error: None,
        },
        Err(e) => {
            log::error!("Error loading data: {e}");
            LoadOutcome {
                table: Arc::new(CotTable::default()),
                loaded: false,
                error: Some(e),
            }
        }
    }
}

/// Load a COT table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.json`            – records (`[{...}, ...]`) or pandas column orient
/// * `.csv`             – header row + one row per record
/// * `.parquet` / `.pq` – flat columns (`df.to_parquet()`)
/// * `.html` / `.htm`   – first `<table>` in the document
/// * `.ipynb`           – first HTML table rendered in a notebook output
pub fn load_file(path: &Path, options: &LoaderOptions) -> Result<CotTable, LoadError> {
    let format = SourceFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string(),
    })?;

    let (records, fallback_date) = match format {
        SourceFormat::Json => {
            let text = read_text(path)?;
            (parse_json(&text).map_err(|e| LoadError::malformed(path, e))?, None)
        }
        SourceFormat::Csv => {
            let file = File::open(path).map_err(|e| LoadError::unavailable(path, e))?;
            (parse_csv(file).map_err(|e| LoadError::malformed(path, e))?, None)
        }
        SourceFormat::Parquet => {
            let file = File::open(path).map_err(|e| LoadError::unavailable(path, e))?;
            (parse_parquet(file).map_err(|e| LoadError::malformed(path, e))?, None)
        }
        SourceFormat::Html => {
            let text = read_text(path)?;
            let records = parse_html(&text).map_err(|e| LoadError::malformed(path, e))?;
            (records, Some(options.snapshot_date()))
        }
        SourceFormat::Notebook => {
            let text = read_text(path)?;
            let records = notebook_html(&text)
                .and_then(|html| parse_html(&html))
                .map_err(|e| LoadError::malformed(path, e))?;
            (records, Some(options.snapshot_date()))
        }
    };

    let (table, layout, stats) =
        build_table(&records, fallback_date).map_err(|e| LoadError::malformed(path, e))?;

    log::info!(
        "Loaded {} observations ({:?} layout, {} markets, {} report dates) from {}",
        table.len(),
        layout,
        table.markets().len(),
        table.dates().len(),
        path.display()
    );
    if stats.skipped > 0 {
        log::warn!("Skipped {} rows without a usable market or date", stats.skipped);
    }
    if table.duplicates_dropped() > 0 {
        log::warn!(
            "Dropped {} duplicate (market, date) rows, keeping the last",
            table.duplicates_dropped()
        );
    }
    let out_of_range = table.out_of_range_indices();
    if out_of_range > 0 {
        log::warn!("{out_of_range} index readings fall outside [0, 100]");
    }

    Ok(table)
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::unavailable(path, e))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema, either records-oriented:
///
/// ```json
/// [
///   { "Market": "Gold", "Date": 1704153600000, "OI_Index": 85.0, ... },
///   ...
/// ]
/// ```
///
/// or pandas' default column orientation:
///
/// ```json
/// { "Date": { "0": 1704153600000, "1": ... }, "Gold_Price": { "0": 2050.0, ... } }
/// ```
fn parse_json(text: &str) -> Result<Vec<RawRecord>> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    match root {
        JsonValue::Array(rows) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let obj = row
                    .as_object()
                    .with_context(|| format!("Row {i} is not a JSON object"))?;
                Ok(obj
                    .iter()
                    .map(|(k, v)| (k.clone(), json_to_cell(v)))
                    .collect())
            })
            .collect(),
        JsonValue::Object(columns) => {
            let mut rows: BTreeMap<RowKey, RawRecord> = BTreeMap::new();
            for (column, values) in &columns {
                let values = values.as_object().with_context(|| {
                    format!("Column '{column}' is not an object of row values")
                })?;
                for (row_key, value) in values {
                    rows.entry(RowKey::new(row_key))
                        .or_default()
                        .insert(column.clone(), json_to_cell(value));
                }
            }
            Ok(rows.into_values().collect())
        }
        _ => bail!("Expected a top-level JSON array or object"),
    }
}

/// Row label in column-oriented JSON; numeric labels sort numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RowKey {
    Index(u64),
    Label(String),
}

impl RowKey {
    fn new(key: &str) -> Self {
        key.parse()
            .map(RowKey::Index)
            .unwrap_or_else(|_| RowKey::Label(key.to_string()))
    }
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one observation (tall) or one
/// report date (wide) per row.
fn parse_csv<R: std::io::Read>(input: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row: RawRecord = headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.clone(), guess_cell_type(value)))
            .collect();
        records.push(row);
    }
    Ok(records)
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    if s == "true" || s == "false" {
        return CellValue::Bool(s == "true");
    }
    CellValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// HTML loader
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{css}': {e:?}"))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Read the first `<table>` of an HTML document.
///
/// Header cells name the columns when they resolve at least one index field.
/// Otherwise the first four columns are taken positionally as
/// [`POSITIONAL_HTML_COLUMNS`]. A leading unnamed column (the pandas index)
/// takes its name from a later header row (`df.set_index("Date")` exports)
/// or is dropped.
fn parse_html(text: &str) -> Result<Vec<RawRecord>> {
    let document = Html::parse_document(text);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .context("no <table> element found")?;

    let mut header_rows: Vec<Vec<String>> = Vec::new();
    let mut body: Vec<Vec<String>> = Vec::new();
    for tr in table.select(&row_sel) {
        let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        let in_head = tr
            .ancestors()
            .filter_map(|n| n.value().as_element())
            .any(|e| e.name() == "thead");
        let all_th = cells.iter().all(|c| c.value().name() == "th");
        let texts: Vec<String> = cells.iter().map(cell_text).collect();

        if body.is_empty() && (in_head || all_th) {
            header_rows.push(texts);
        } else if !in_head {
            body.push(texts);
        }
    }

    let mut rows = header_rows.into_iter();
    let mut header = rows.next().unwrap_or_default();
    let width = body.iter().map(Vec::len).max().unwrap_or(0);
    if header.first().is_some_and(|h| h.is_empty()) && header.len() == width {
        let index_name = rows
            .filter_map(|r| r.into_iter().next())
            .find(|name| !name.is_empty());
        match index_name {
            Some(name) => header[0] = name,
            None => {
                header.remove(0);
                for row in &mut body {
                    if !row.is_empty() {
                        row.remove(0);
                    }
                }
            }
        }
    }

    let columns: Vec<String> = if names_index_column(&header) {
        header
    } else {
        POSITIONAL_HTML_COLUMNS.iter().map(|c| c.to_string()).collect()
    };

    Ok(body
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.clone(), guess_cell_type(&value)))
                .collect()
        })
        .collect())
}

/// Whether a header row names at least one index column, directly or as a
/// `<Market>_<Field>` column.
fn names_index_column(header: &[String]) -> bool {
    header
        .iter()
        .filter_map(|h| Field::from_column(h).or_else(|| split_wide_column(h).map(|(_, f)| f)))
        .any(|f| Field::INDICES.contains(&f))
}

/// Concatenate the `text/html` outputs of a Jupyter notebook.
fn notebook_html(text: &str) -> Result<String> {
    let root: JsonValue = serde_json::from_str(text).context("parsing notebook JSON")?;
    let cells = root
        .get("cells")
        .and_then(JsonValue::as_array)
        .context("notebook has no 'cells' array")?;

    let mut html = String::new();
    for output in cells
        .iter()
        .filter_map(|c| c.get("outputs").and_then(JsonValue::as_array))
        .flatten()
    {
        match output.pointer("/data/text~1html") {
            Some(JsonValue::String(s)) => html.push_str(s),
            Some(JsonValue::Array(lines)) => {
                for line in lines.iter().filter_map(JsonValue::as_str) {
                    html.push_str(line);
                }
            }
            _ => {}
        }
    }
    if html.is_empty() {
        bail!("notebook has no HTML table output");
    }
    Ok(html)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns (one per source column). Written by
/// both **Pandas** (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
fn parse_parquet(file: File) -> Result<Vec<RawRecord>> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

        for row in 0..batch.num_rows() {
            let record: RawRecord = names
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.clone(), extract_cell(batch.column(idx), row)))
                .collect();
            records.push(record);
        }
    }
    Ok(records)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let cell = match col.data_type() {
        DataType::Utf8 => col
            .as_string_opt::<i32>()
            .map(|s| CellValue::String(s.value(row).to_string())),
        DataType::LargeUtf8 => col
            .as_string_opt::<i64>()
            .map(|s| CellValue::String(s.value(row).to_string())),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| CellValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => col
            .as_primitive_opt::<Int64Type>()
            .map(|a| CellValue::Integer(a.value(row))),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| CellValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => col
            .as_primitive_opt::<Float64Type>()
            .map(|a| CellValue::Float(a.value(row))),
        DataType::Boolean => col.as_boolean_opt().map(|a| CellValue::Bool(a.value(row))),
        DataType::Date32 => col
            .as_primitive_opt::<Date32Type>()
            .and_then(|a| a.value_as_date(row))
            .map(CellValue::Date),
        DataType::Timestamp(unit, _) => {
            let datetime = match unit {
                TimeUnit::Second => col
                    .as_primitive_opt::<TimestampSecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Millisecond => col
                    .as_primitive_opt::<TimestampMillisecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Microsecond => col
                    .as_primitive_opt::<TimestampMicrosecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
                TimeUnit::Nanosecond => col
                    .as_primitive_opt::<TimestampNanosecondType>()
                    .and_then(|a| a.value_as_datetime(row)),
            };
            datetime.map(|dt| CellValue::Date(dt.date()))
        }
        _ => None,
    };
    cell.unwrap_or(CellValue::Null)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, StringArray, TimestampMillisecondArray};
    use arrow::datatypes::Schema;
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_file_yields_unloaded_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load(&dir.path().join("df6.json"), &LoaderOptions::default());
        assert!(!outcome.loaded);
        assert!(outcome.table.is_empty());
        assert!(matches!(
            outcome.error,
            Some(LoadError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "table.xlsx", "");
        let outcome = load(&path, &LoaderOptions::default());
        assert!(!outcome.loaded);
        assert!(matches!(
            outcome.error,
            Some(LoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "df6.json", "{ not json");
        let outcome = load(&path, &LoaderOptions::default());
        assert!(!outcome.loaded);
        assert!(matches!(
            outcome.error,
            Some(LoadError::SourceMalformed { .. })
        ));
    }

    #[test]
    fn test_json_records_with_epoch_millis() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "df6.json",
            r#"[
                {"Market": "Gold", "Date": 1704153600000, "OI_Index": 85, "Retail_Index": 50, "Commercial_Index": 50, "Open_Interest": 500000},
                {"Market": "Silver", "Date": 1704153600000, "OI_Index": 10, "Retail_Index": 50, "Commercial_Index": 50, "OI": 120000}
            ]"#,
        );
        let outcome = load(&path, &LoaderOptions::default());
        assert!(outcome.loaded);
        let table = outcome.table;
        assert_eq!(table.len(), 2);
        assert_eq!(table.latest_date(), Some(day(2024, 1, 2)));
        let silver = table.rows().iter().find(|r| r.market == "Silver").unwrap();
        assert_eq!(silver.open_interest, Some(120_000.0));
    }

    #[test]
    fn test_json_column_orient_wide() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "df6.json",
            r#"{
                "Date": {"0": 1704153600000, "1": 1704758400000, "10": 1709596800000},
                "Gold_Open_Interest_Index": {"0": 70.0, "1": 72.5, "10": 90.0},
                "Gold_Price": {"0": 2050.0, "1": 2030.0, "10": 2120.0}
            }"#,
        );
        let table = load_file(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.markets(), ["Gold"]);
        assert_eq!(
            table.dates(),
            [day(2024, 1, 2), day(2024, 1, 9), day(2024, 3, 5)]
        );
        assert_eq!(table.rows()[2].oi_index, Some(90.0));
    }

    #[test]
    fn test_csv_tall() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "cot.csv",
            "Market,Date,OI_Index,Retail_Index,Commercial_Index,Close,RSI\n\
             Gold,2024-01-02,85,40,60,2050.5,62\n\
             Gold,2024-01-09,81,42,58,2031.0,55\n",
        );
        let table = load_file(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_field(Field::Rsi));
        assert!(!table.has_field(Field::MovingAverage200));
        assert_eq!(table.rows()[0].close, Some(2050.5));
    }

    #[test]
    fn test_html_positional_columns_use_snapshot_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "export.html",
            r#"<html><body>
            <table class="dataframe">
              <thead><tr><th></th><th>0</th><th>1</th><th>2</th><th>3</th></tr></thead>
              <tbody>
                <tr><th>0</th><td>Gold</td><td>85.0</td><td>30.1</td><td>70.2</td></tr>
                <tr><th>1</th><td>Silver</td><td>12.0</td><td>55.0</td><td>45.0</td></tr>
              </tbody>
            </table>
            <table><tr><td>ignored</td></tr></table>
            </body></html>"#,
        );
        let options = LoaderOptions {
            snapshot_date: Some(day(2024, 1, 2)),
        };
        let table = load_file(&path, &options).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.dates(), [day(2024, 1, 2)]);
        let gold = table.rows().iter().find(|r| r.market == "Gold").unwrap();
        assert_eq!(gold.oi_index, Some(85.0));
        assert_eq!(gold.retail_index, Some(30.1));
        assert_eq!(gold.commercial_index, Some(70.2));
    }

    #[test]
    fn test_html_named_header_with_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "export.htm",
            r#"<table>
              <tr><th>Date</th><th>Market</th><th>OI_Index</th></tr>
              <tr><td>2024-01-02</td><td>Gold</td><td>55</td></tr>
              <tr><td>2024-01-09</td><td>Gold</td><td>57</td></tr>
            </table>"#,
        );
        let table = load_file(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.dates(), [day(2024, 1, 2), day(2024, 1, 9)]);
    }

    #[test]
    fn test_html_unrecognised_index_headers_fall_back_to_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "export.html",
            r#"<table>
              <thead><tr><th>Market</th><th>OI Idx</th><th>Retail</th><th>Commercial</th></tr></thead>
              <tbody>
                <tr><td>Gold</td><td>82.0</td><td>15.0</td><td>88.0</td></tr>
                <tr><td>Copper</td><td>40.0</td><td>50.0</td><td>60.0</td></tr>
              </tbody>
            </table>"#,
        );
        let options = LoaderOptions {
            snapshot_date: Some(day(2024, 3, 5)),
        };
        let table = load_file(&path, &options).unwrap();
        assert_eq!(table.markets(), ["Copper", "Gold"]);
        let gold = table.rows().iter().find(|r| r.market == "Gold").unwrap();
        assert_eq!(gold.oi_index, Some(82.0));
        assert_eq!(gold.retail_index, Some(15.0));
        assert_eq!(gold.commercial_index, Some(88.0));
    }

    #[test]
    fn test_html_named_index_column_keeps_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "export.html",
            r#"<table class="dataframe">
              <thead>
                <tr><th></th><th>Market</th><th>OI_Index</th><th>Retail_Index</th></tr>
                <tr><th>Date</th><th></th><th></th><th></th></tr>
              </thead>
              <tbody>
                <tr><th>2024-01-02</th><td>Gold</td><td>61.0</td><td>40.0</td></tr>
                <tr><th>2024-01-09</th><td>Gold</td><td>64.0</td><td>38.0</td></tr>
              </tbody>
            </table>"#,
        );
        let options = LoaderOptions {
            snapshot_date: Some(day(2025, 6, 1)),
        };
        let table = load_file(&path, &options).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.duplicates_dropped(), 0);
        assert_eq!(table.dates(), [day(2024, 1, 2), day(2024, 1, 9)]);
        assert_eq!(table.rows()[1].oi_index, Some(64.0));
    }

    #[test]
    fn test_html_without_table_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "export.html", "<html><p>nothing</p></html>");
        assert!(matches!(
            load_file(&path, &LoaderOptions::default()),
            Err(LoadError::SourceMalformed { .. })
        ));
    }

    #[test]
    fn test_notebook_html_output() {
        let dir = tempfile::tempdir().unwrap();
        let notebook = serde_json::json!({
            "cells": [
                {"cell_type": "markdown", "source": ["# COT"]},
                {"cell_type": "code", "outputs": [{
                    "output_type": "execute_result",
                    "data": {
                        "text/plain": ["..."],
                        "text/html": [
                            "<table>\n",
                            "<thead><tr><th></th><th>Market</th><th>OI_Index</th><th>Retail_Index</th><th>Commercial_Index</th></tr></thead>\n",
                            "<tbody><tr><th>0</th><td>Copper</td><td>18</td><td>70</td><td>30</td></tr></tbody>\n",
                            "</table>"
                        ]
                    }
                }]}
            ]
        });
        let path = write_fixture(&dir, "COT Experiments.ipynb", &notebook.to_string());
        let options = LoaderOptions {
            snapshot_date: Some(day(2024, 2, 6)),
        };
        let table = load_file(&path, &options).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].market, "Copper");
        assert_eq!(table.rows()[0].oi_index, Some(18.0));
    }

    #[test]
    fn test_parquet_tall_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cot.parquet");

        let schema = Arc::new(Schema::new(vec![
            arrow::datatypes::Field::new("Market", DataType::Utf8, false),
            arrow::datatypes::Field::new(
                "Date",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
            arrow::datatypes::Field::new("OI_Index", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["Gold", "Gold"])),
                Arc::new(TimestampMillisecondArray::from(vec![
                    1_704_153_600_000,
                    1_704_758_400_000,
                ])),
                Arc::new(Float64Array::from(vec![Some(60.0), None])),
            ],
        )
        .unwrap();
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.dates(), [day(2024, 1, 2), day(2024, 1, 9)]);
        assert_eq!(table.rows()[0].oi_index, Some(60.0));
        assert_eq!(table.rows()[1].oi_index, None);
    }
}
