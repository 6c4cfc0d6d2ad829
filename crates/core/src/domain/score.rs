use serde::{Deserialize, Serialize};

/// Model-assigned performance score for one symbol's chart.
///
/// `score` is in [0, 10]; an unparseable model reply yields exactly 0
/// (defined fallback, not an error). `raw_response` is kept for diagnostics.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub symbol: String,
    pub score: f64,
    pub raw_response: String,
}

/// Final output: up to 3 symbols, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub top_stocks: Vec<String>,
}
