use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartscore_core::pipeline::AnalysisRequest;
use chartscore_core::storage::{ObjectStore, S3ObjectStore};
use chartscore_core::{chart, ingest};

#[derive(Debug, Parser)]
#[command(name = "chartscore_worker")]
struct Args {
    /// Bucket holding the input CSV (charts are uploaded here too).
    #[arg(long)]
    bucket: String,

    /// Key of the input CSV within the bucket.
    #[arg(long)]
    key: String,

    /// Ingest, window and render, but skip uploads and model calls.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = chartscore_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let store = S3ObjectStore::from_settings(&settings).await;
    let request = AnalysisRequest {
        s3_bucket: args.bucket,
        s3_key: args.key,
    };

    if args.dry_run {
        return dry_run(&store, &request).await;
    }

    let scorer = chartscore_core::llm::anthropic::AnthropicClient::from_settings(&settings)?;

    let result = chartscore_core::pipeline::run_pipeline(&store, &scorer, &request).await;
    match result {
        Ok(ranked) => {
            println!(
                "{}",
                serde_json::to_string(&ranked).context("failed to serialize ranked result")?
            );
            tracing::info!(top_stocks = ?ranked.top_stocks, "analysis run complete");
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "analysis run failed");
            Err(err)
        }
    }
}

/// Everything except the side effects: download, ingest, window, render.
async fn dry_run(store: &S3ObjectStore, request: &AnalysisRequest) -> anyhow::Result<()> {
    let csv_bytes = store
        .get_object(&request.s3_bucket, &request.s3_key)
        .await?;
    let records = ingest::read_price_records(&csv_bytes)?;
    let series = chart::window_series(&records);

    let Some((start, end)) = chart::trailing_window(&records) else {
        tracing::info!(dry_run = true, "no records; nothing to render");
        return Ok(());
    };

    for s in &series {
        let png = chart::render_chart(s, start, end)?;
        tracing::info!(
            dry_run = true,
            symbol = %s.symbol,
            points = s.records.len(),
            png_bytes = png.len(),
            "rendered chart (not uploaded)"
        );
    }

    tracing::info!(
        dry_run = true,
        records = records.len(),
        symbols = series.len(),
        %start,
        %end,
        "dry run complete; skipped uploads and model calls"
    );
    Ok(())
}

fn init_sentry(settings: &chartscore_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
