pub mod error;

use crate::chart;
use crate::domain::score::{RankedResult, ScoreResult};
use crate::ingest;
use crate::llm::{self, ScoreClient, ScoreRequest};
use crate::pipeline::error::{StageError, StageKind};
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};

const TOP_N: usize = 3;

/// Invocation input: object-storage location of the price CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub s3_bucket: String,
    pub s3_key: String,
}

/// Run the four stages in strict sequence: download + ingest the CSV,
/// render and upload one chart per in-window symbol, score each chart
/// through the model, rank.
///
/// Any stage failure aborts the remainder and surfaces as a [`StageError`]
/// inside the returned `anyhow::Error`.
pub async fn run_pipeline(
    store: &dyn ObjectStore,
    scorer: &dyn ScoreClient,
    request: &AnalysisRequest,
) -> anyhow::Result<RankedResult> {
    let csv_bytes = store
        .get_object(&request.s3_bucket, &request.s3_key)
        .await
        .map_err(|e| StageError::wrap(StageKind::InputRetrieval, e))?;

    let records = ingest::read_price_records(&csv_bytes)
        .map_err(|e| StageError::wrap(StageKind::Parse, e))?;
    tracing::info!(records = records.len(), key = %request.s3_key, "ingested price records");

    let keys = chart::plot_and_upload(store, &request.s3_bucket, &records)
        .await
        .map_err(|e| StageError::wrap(StageKind::RenderOrUpload, e))?;

    let scores = score_charts(scorer, &request.s3_bucket, &keys).await?;

    Ok(rank_top_stocks(&scores))
}

/// Score every uploaded chart, in upload order.
///
/// Transport or provider failures propagate (`Inference`); a reply that
/// cannot be parsed into a `performance_metric` scores exactly 0
/// (`ResponseFormat`, recovered locally).
pub async fn score_charts(
    scorer: &dyn ScoreClient,
    bucket: &str,
    keys: &[String],
) -> anyhow::Result<Vec<ScoreResult>> {
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let symbol = llm::symbol_from_key(key);
        let request = ScoreRequest {
            symbol: symbol.clone(),
            bucket: bucket.to_string(),
            key: key.clone(),
        };

        let raw = scorer
            .score_chart(&request)
            .await
            .map_err(|e| StageError::wrap(StageKind::Inference, e))?;

        let score = match llm::json::parse_score(&raw) {
            Ok(score) => score,
            Err(err) => {
                let err = StageError::wrap(StageKind::ResponseFormat, err);
                tracing::warn!(%symbol, error = %err, "model reply not parseable; scoring 0");
                0.0
            }
        };

        tracing::info!(%symbol, score, "scored chart");
        out.push(ScoreResult {
            symbol,
            score,
            raw_response: raw,
        });
    }
    Ok(out)
}

/// Sort by score descending (stable, so ties keep scoring order) and keep
/// the first 3.
pub fn rank_top_stocks(scores: &[ScoreResult]) -> RankedResult {
    let mut ordered: Vec<&ScoreResult> = scores.iter().collect();
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score));
    RankedResult {
        top_stocks: ordered
            .into_iter()
            .take(TOP_N)
            .map(|s| s.symbol.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryObjectStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryObjectStore {
        fn seed(bucket: &str, key: &str, body: &[u8]) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(format!("{bucket}/{key}"), body.to_vec());
            store
        }

        fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&format!("{bucket}/{key}"))
                .cloned()
        }
    }

    #[async_trait::async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>> {
            self.get(bucket, key)
                .ok_or_else(|| anyhow::anyhow!("no such object: s3://{bucket}/{key}"))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            _content_type: &str,
        ) -> anyhow::Result<()> {
            self.objects
                .lock()
                .unwrap()
                .insert(format!("{bucket}/{key}"), body);
            Ok(())
        }
    }

    /// Replies keyed by symbol; a symbol without a scripted reply fails the
    /// call, standing in for a transport error.
    struct ScriptedScorer {
        replies: HashMap<String, String>,
    }

    impl ScriptedScorer {
        fn new(replies: &[(&str, &str)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    #[async_trait::async_trait]
    impl ScoreClient for ScriptedScorer {
        async fn score_chart(&self, request: &ScoreRequest) -> anyhow::Result<String> {
            self.replies
                .get(&request.symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("inference endpoint unavailable"))
        }
    }

    fn sample_csv() -> &'static [u8] {
        // Max date 2026-06-01; window starts 2026-03-01. All rows in-window.
        b"Stock,Date,Price\n\
          AAA,2026-04-01,10\n\
          AAA,2026-05-01,12\n\
          BBB,2026-04-01,20\n\
          BBB,2026-05-01,21\n\
          CCC,2026-04-01,30\n\
          CCC,2026-06-01,28\n"
    }

    fn stage_kind(err: &anyhow::Error) -> StageKind {
        err.downcast_ref::<StageError>()
            .expect("expected a StageError")
            .kind
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            s3_bucket: "charts".to_string(),
            s3_key: "input/prices.csv".to_string(),
        }
    }

    #[tokio::test]
    async fn end_to_end_ranks_all_three_symbols() {
        let store = MemoryObjectStore::seed("charts", "input/prices.csv", sample_csv());
        let scorer = ScriptedScorer::new(&[
            ("AAA", "{\"performance_metric\": 9}"),
            ("BBB", "{\"performance_metric\": 7}"),
            ("CCC", "{\"performance_metric\": 2}"),
        ]);

        let ranked = run_pipeline(&store, &scorer, &request()).await.unwrap();
        assert_eq!(ranked.top_stocks, vec!["AAA", "BBB", "CCC"]);

        // One PNG per symbol, under the deterministic key convention.
        for symbol in ["AAA", "BBB", "CCC"] {
            let png = store
                .get("charts", &format!("plots/{symbol}_3_months.png"))
                .expect("chart should be uploaded");
            assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        }
    }

    #[tokio::test]
    async fn prose_reply_scores_zero_and_ranking_continues() {
        let store = MemoryObjectStore::seed("charts", "input/prices.csv", sample_csv());
        let scorer = ScriptedScorer::new(&[
            ("AAA", "{\"performance_metric\": 5}"),
            ("BBB", "Looks like a strong uptrend to me!"),
            ("CCC", "{\"performance_metric\": 3}"),
        ]);

        let ranked = run_pipeline(&store, &scorer, &request()).await.unwrap();
        assert_eq!(ranked.top_stocks, vec!["AAA", "CCC", "BBB"]);
    }

    #[tokio::test]
    async fn unparseable_date_fails_with_parse_kind() {
        let csv = b"Stock,Date,Price\nAAA,not-a-date,10\n";
        let store = MemoryObjectStore::seed("charts", "input/prices.csv", csv);
        let scorer = ScriptedScorer::new(&[]);

        let err = run_pipeline(&store, &scorer, &request()).await.unwrap_err();
        assert_eq!(stage_kind(&err), StageKind::Parse);
    }

    #[tokio::test]
    async fn missing_input_object_fails_with_input_retrieval_kind() {
        let store = MemoryObjectStore::default();
        let scorer = ScriptedScorer::new(&[]);

        let err = run_pipeline(&store, &scorer, &request()).await.unwrap_err();
        assert_eq!(stage_kind(&err), StageKind::InputRetrieval);
    }

    #[tokio::test]
    async fn inference_failure_propagates() {
        let store = MemoryObjectStore::seed("charts", "input/prices.csv", sample_csv());
        // No reply scripted for BBB or CCC.
        let scorer = ScriptedScorer::new(&[("AAA", "{\"performance_metric\": 9}")]);

        let err = run_pipeline(&store, &scorer, &request()).await.unwrap_err();
        assert_eq!(stage_kind(&err), StageKind::Inference);
    }

    #[tokio::test]
    async fn empty_csv_yields_empty_ranking() {
        let store = MemoryObjectStore::seed("charts", "input/prices.csv", b"Stock,Date,Price\n");
        let scorer = ScriptedScorer::new(&[]);

        let ranked = run_pipeline(&store, &scorer, &request()).await.unwrap();
        assert!(ranked.top_stocks.is_empty());
    }

    fn score(symbol: &str, score: f64) -> ScoreResult {
        ScoreResult {
            symbol: symbol.to_string(),
            score,
            raw_response: String::new(),
        }
    }

    #[test]
    fn ranking_takes_top_three_descending() {
        let scores = [
            score("A", 1.0),
            score("B", 8.0),
            score("C", 5.0),
            score("D", 9.0),
        ];
        let ranked = rank_top_stocks(&scores);
        assert_eq!(ranked.top_stocks, vec!["D", "B", "C"]);
    }

    #[test]
    fn ranking_breaks_ties_by_scoring_order() {
        let scores = [score("A", 5.0), score("B", 5.0), score("C", 5.0)];
        let ranked = rank_top_stocks(&scores);
        assert_eq!(ranked.top_stocks, vec!["A", "B", "C"]);
    }

    #[test]
    fn ranking_returns_fewer_than_three_when_fewer_scored() {
        let scores = [score("A", 5.0)];
        assert_eq!(rank_top_stocks(&scores).top_stocks, vec!["A"]);
        assert!(rank_top_stocks(&[]).top_stocks.is_empty());
    }
}
