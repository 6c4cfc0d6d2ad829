use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: f64,
}

/// Date-ordered records for a single symbol. Built fresh per request.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub records: Vec<PriceRecord>,
}

/// A rendered chart headed for object storage. Once uploaded, only the
/// storage key survives in the pipeline.
#[derive(Debug, Clone)]
pub struct ChartArtifact {
    pub symbol: String,
    pub storage_key: String,
    pub image_bytes: Vec<u8>,
}
