use crate::domain::price::{ChartArtifact, PriceRecord, PriceSeries};
use crate::storage::ObjectStore;
use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use plotters::prelude::*;
use std::collections::HashMap;

const WINDOW_MONTHS: u32 = 3;

const CHART_WIDTH: u32 = 1000;
const CHART_HEIGHT: u32 = 500;

pub fn chart_key(symbol: &str) -> String {
    format!("plots/{symbol}_{WINDOW_MONTHS}_months.png")
}

/// Trailing window over the full input: `end = max(date)`,
/// `start = end - 3 calendar months`, both bounds inclusive.
/// `None` when there are no records at all.
pub fn trailing_window(records: &[PriceRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let end = records.iter().map(|r| r.date).max()?;
    let start = end.checked_sub_months(Months::new(WINDOW_MONTHS))?;
    Some((start, end))
}

/// Filter to the trailing window and group by symbol.
///
/// Symbols keep the order of their first appearance in the filtered data;
/// symbols with no in-window records are silently omitted. Records within
/// a series are sorted by date.
pub fn window_series(records: &[PriceRecord]) -> Vec<PriceSeries> {
    let Some((start, end)) = trailing_window(records) else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<PriceRecord>> = HashMap::new();
    for record in records {
        if record.date < start || record.date > end {
            continue;
        }
        if !grouped.contains_key(&record.symbol) {
            order.push(record.symbol.clone());
        }
        grouped
            .entry(record.symbol.clone())
            .or_default()
            .push(record.clone());
    }

    order
        .into_iter()
        .map(|symbol| {
            let mut records = grouped.remove(&symbol).unwrap_or_default();
            records.sort_by_key(|r| r.date);
            PriceSeries { symbol, records }
        })
        .collect()
}

/// Render one symbol's line chart as an in-memory PNG.
pub fn render_chart(series: &PriceSeries, start: NaiveDate, end: NaiveDate) -> Result<Vec<u8>> {
    anyhow::ensure!(
        !series.records.is_empty(),
        "cannot render an empty series for {}",
        series.symbol
    );

    let (mut y_min, mut y_max) = series.records.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), r| (lo.min(r.price), hi.max(r.price)),
    );
    if (y_max - y_min).abs() < f64::EPSILON {
        // Flat series; give the axis some room.
        y_min -= 1.0;
        y_max += 1.0;
    } else {
        let pad = (y_max - y_min) * 0.05;
        y_min -= pad;
        y_max += pad;
    }

    let mut buf = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!(
                    "Stock Prices for {} over Last {WINDOW_MONTHS} Months",
                    series.symbol
                ),
                ("sans-serif", 24),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(start..end, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Price")
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                series.records.iter().map(|r| (r.date, r.price)),
                &BLUE,
            ))?
            .label(series.symbol.clone())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()?;

        root.present()?;
    }

    let img = image::RgbImage::from_raw(CHART_WIDTH, CHART_HEIGHT, buf)
        .context("chart pixel buffer has unexpected size")?;
    let mut png = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut png),
        image::ImageFormat::Png,
    )
    .context("failed to encode chart as PNG")?;
    Ok(png)
}

fn render_artifact(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ChartArtifact> {
    let image_bytes = render_chart(series, start, end)
        .with_context(|| format!("failed to render chart for {}", series.symbol))?;
    Ok(ChartArtifact {
        symbol: series.symbol.clone(),
        storage_key: chart_key(&series.symbol),
        image_bytes,
    })
}

/// Render and upload one chart per in-window symbol.
///
/// Returns the storage keys written, in symbol encounter order. Any render
/// or upload failure propagates and aborts the remaining stages.
pub async fn plot_and_upload(
    store: &dyn ObjectStore,
    bucket: &str,
    records: &[PriceRecord],
) -> Result<Vec<String>> {
    let Some((start, end)) = trailing_window(records) else {
        tracing::info!("no price records; nothing to chart");
        return Ok(Vec::new());
    };

    let mut keys = Vec::new();
    for series in window_series(records) {
        let artifact = render_artifact(&series, start, end)?;
        store
            .put_object(
                bucket,
                &artifact.storage_key,
                artifact.image_bytes,
                "image/png",
            )
            .await
            .with_context(|| {
                format!("failed to upload chart for {} to {bucket}", artifact.symbol)
            })?;

        tracing::info!(
            symbol = %artifact.symbol,
            key = %artifact.storage_key,
            "uploaded chart"
        );
        keys.push(artifact.storage_key);
    }

    Ok(keys)
}
