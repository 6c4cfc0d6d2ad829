use anyhow::{Context, Result};

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Pull the `performance_metric` number out of a model reply.
///
/// Fails on anything that is not JSON with a numeric `performance_metric`
/// field; the caller turns that failure into the defined score-0 fallback.
/// Numbers outside [0, 10] are clamped.
pub fn parse_score(text: &str) -> Result<f64> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let value = serde_json::from_str::<serde_json::Value>(&json_str)
        .with_context(|| format!("model reply is not valid JSON: {json_str}"))?;
    let metric = value
        .get("performance_metric")
        .context("model reply has no performance_metric field")?;
    let score = metric
        .as_f64()
        .with_context(|| format!("performance_metric is not a number: {metric}"))?;
    Ok(score.clamp(0.0, 10.0))
}
