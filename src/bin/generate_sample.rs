use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate, NaiveTime};
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value};

const WEEKS: u64 = 156;
const MA_WINDOW: usize = 40; // ~200 trading days of weekly closes
const RSI_PERIOD: usize = 14;

/// (market, group, starting price, starting open interest)
const MARKETS: [(&str, &str, f64, f64); 7] = [
    ("Gold", "Metals", 1850.0, 520_000.0),
    ("Silver", "Metals", 24.0, 150_000.0),
    ("Copper", "Metals", 3.6, 210_000.0),
    ("Crude Oil", "Energy", 48.0, 2_100_000.0),
    ("Natural Gas", "Energy", 2.5, 1_200_000.0),
    ("Corn", "Grains", 480.0, 1_500_000.0),
    ("Wheat", "Grains", 640.0, 400_000.0),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Mean-reverting walk kept inside [0, 100].
fn index_step(rng: &mut SimpleRng, value: f64) -> f64 {
    (value + 0.08 * (50.0 - value) + rng.gauss(0.0, 9.0)).clamp(0.0, 100.0)
}

fn moving_average(closes: &[f64]) -> Option<f64> {
    if closes.len() < MA_WINDOW {
        return None;
    }
    let window = &closes[closes.len() - MA_WINDOW..];
    Some(window.iter().sum::<f64>() / MA_WINDOW as f64)
}

fn rsi(closes: &[f64]) -> Option<f64> {
    if closes.len() <= RSI_PERIOD {
        return None;
    }
    let window = &closes[closes.len() - RSI_PERIOD - 1..];
    let (gains, losses) = window.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let change = w[1] - w[0];
        if change >= 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });
    if losses == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + gains / losses))
}

struct Row {
    market: &'static str,
    group: &'static str,
    date: NaiveDate,
    oi_index: f64,
    retail_index: f64,
    commercial_index: f64,
    open_interest: f64,
    close: f64,
    ma_200: Option<f64>,
    rsi: Option<f64>,
}

fn generate(rng: &mut SimpleRng, start: NaiveDate) -> Vec<Row> {
    let mut rows = Vec::new();
    for &(market, group, price0, oi0) in &MARKETS {
        let mut closes = Vec::new();
        let mut price = price0;
        let mut oi = oi0;
        let mut oi_index = 50.0;
        let mut retail = 50.0;

        for week in 0..WEEKS {
            price *= 1.0 + rng.gauss(0.001, 0.03);
            oi = (oi * (1.0 + rng.gauss(0.0, 0.04))).max(oi0 * 0.2);
            oi_index = index_step(rng, oi_index);
            retail = index_step(rng, retail);
            // Commercials tend to take the other side of retail.
            let commercial = (100.0 - retail + rng.gauss(0.0, 6.0)).clamp(0.0, 100.0);
            closes.push(price);

            rows.push(Row {
                market,
                group,
                date: start + Days::new(week * 7),
                oi_index,
                retail_index: retail,
                commercial_index: commercial,
                open_interest: oi.round(),
                close: price,
                ma_200: moving_average(&closes),
                rsi: rsi(&closes),
            });
        }
    }
    rows
}

fn write_parquet(rows: &[Row], path: &str) -> Result<()> {
    let epoch = NaiveDate::default();
    let schema = Arc::new(Schema::new(vec![
        Field::new("Market", DataType::Utf8, false),
        Field::new("Group", DataType::Utf8, false),
        Field::new("Date", DataType::Date32, false),
        Field::new("OI_Index", DataType::Float64, false),
        Field::new("Retail_Index", DataType::Float64, false),
        Field::new("Commercial_Index", DataType::Float64, false),
        Field::new("Open_Interest", DataType::Float64, false),
        Field::new("Close", DataType::Float64, false),
        Field::new("200-day moving average", DataType::Float64, true),
        Field::new("RSI", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.market))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.group))),
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| (r.date - epoch).num_days() as i32),
            )),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.oi_index))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.retail_index))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.commercial_index))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.open_interest))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.close))),
            Arc::new(rows.iter().map(|r| r.ma_200).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.rsi).collect::<Float64Array>()),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

/// Wide layout, one record per date with `<Market>_<Field>` columns and the
/// date as epoch milliseconds, as pandas writes it.
fn write_wide_json(rows: &[Row], path: &str) -> Result<()> {
    let mut by_date: std::collections::BTreeMap<NaiveDate, Map<String, Value>> =
        std::collections::BTreeMap::new();
    for row in rows {
        let record = by_date.entry(row.date).or_insert_with(|| {
            let millis = row.date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
            let mut m = Map::new();
            m.insert("Date".into(), Value::from(millis));
            m
        });
        let prefix = row.market;
        record.insert(format!("{prefix}_Open_Interest_Index"), Value::from(row.oi_index));
        record.insert(format!("{prefix}_Retail_Index"), Value::from(row.retail_index));
        record.insert(format!("{prefix}_Commercial_Index"), Value::from(row.commercial_index));
        record.insert(format!("{prefix}_Open_Interest"), Value::from(row.open_interest));
        record.insert(format!("{prefix}_Price"), Value::from(row.close));
    }
    let records: Vec<Value> = by_date.into_values().map(Value::Object).collect();
    let text = serde_json::to_string_pretty(&records).context("serialising JSON")?;
    std::fs::write(path, text).with_context(|| format!("writing {path}"))?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    // First Tuesday of 2021.
    let start = NaiveDate::from_ymd_opt(2021, 1, 5).context("invalid start date")?;
    let rows = generate(&mut rng, start);

    let parquet_path = "sample_cot.parquet";
    write_parquet(&rows, parquet_path)?;
    let json_path = "sample_cot_wide.json";
    write_wide_json(&rows, json_path)?;

    println!(
        "Wrote {} observations ({} markets × {WEEKS} weeks) to {parquet_path} and {json_path}",
        rows.len(),
        MARKETS.len()
    );
    Ok(())
}
