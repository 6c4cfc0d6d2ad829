pub mod anthropic;
pub mod json;

/// One chart to score. The chart is referenced by its storage location,
/// not embedded as bytes; the prompt carries the `s3://` URL.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub symbol: String,
    pub bucket: String,
    pub key: String,
}

impl ScoreRequest {
    pub fn chart_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// Fixed analysis prompt: trend direction, volatility, overall
    /// performance, forward outlook, score in [0, 10].
    pub fn prompt(&self) -> String {
        format!(
            "Analyze the stock plot located at {url}. The plot represents the stock price \
             of {symbol} over the last three months. Consider the following aspects while \
             analyzing the plot: \
             1. The overall trend direction (upward, downward, or stable) of the stock price. \
             2. The volatility of the stock price (high or low fluctuations). \
             3. The overall performance based on the visual data. \
             4. Potential future growth or decline inferred from the trend. \
             Provide a score between 0 and 10, 0 being lowest performing stock and 10 best \
             performing stock based on performance for this stock based on the visual data \
             in the plot.",
            url = self.chart_url(),
            symbol = self.symbol,
        )
    }
}

/// Seam for the hosted model. Returns the model's raw text reply; score
/// extraction (and its 0 fallback) is the caller's concern.
#[async_trait::async_trait]
pub trait ScoreClient: Send + Sync {
    async fn score_chart(&self, request: &ScoreRequest) -> anyhow::Result<String>;
}

/// Recover the symbol from a chart key: strip the path, then everything
/// from the first `_` (the `_3_months.png` suffix convention).
pub fn symbol_from_key(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    file.split('_').next().unwrap_or(file).to_string()
}
