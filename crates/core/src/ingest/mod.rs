use crate::domain::price::PriceRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;

const COL_STOCK: &str = "Stock";
const COL_DATE: &str = "Date";
const COL_PRICE: &str = "Price";

// ISO first, then common US/EU spellings. Anything else fails the row.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Read a headered CSV into price records.
///
/// The input must carry at least `Stock`, `Date` and `Price` columns; a
/// missing column or any row whose date or price does not parse fails the
/// whole ingestion. No deduplication, no other validation.
pub fn read_price_records(bytes: &[u8]) -> Result<Vec<PriceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let stock_idx = column_index(&headers, COL_STOCK)?;
    let date_idx = column_index(&headers, COL_DATE)?;
    let price_idx = column_index(&headers, COL_PRICE)?;

    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // Header is line 1; data starts at line 2.
        let line = row + 2;
        let record = record.with_context(|| format!("failed to read CSV record (line {line})"))?;

        let symbol = field(&record, stock_idx, COL_STOCK, line)?.to_string();
        let date_str = field(&record, date_idx, COL_DATE, line)?;
        let price_str = field(&record, price_idx, COL_PRICE, line)?;

        let date = parse_date(date_str)
            .with_context(|| format!("invalid {COL_DATE} {date_str:?} (line {line})"))?;
        let price = price_str
            .parse::<f64>()
            .with_context(|| format!("invalid {COL_PRICE} {price_str:?} (line {line})"))?;

        out.push(PriceRecord {
            symbol,
            date,
            price,
        });
    }

    Ok(out)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("required column {name:?} is missing"))
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<&'r str> {
    record
        .get(idx)
        .with_context(|| format!("column {name:?} is missing (line {line})"))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    anyhow::bail!("unrecognized date format")
}
