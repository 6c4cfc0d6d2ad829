pub mod chart;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub aws_region: Option<String>,
        pub sentry_dsn: Option<String>,
        /// Attach the failed stage kind to failure responses. Off by default to
        /// keep the bare `{"message": ...}` compatibility shape.
        pub error_detail: bool,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                aws_region: std::env::var("AWS_REGION").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                error_detail: std::env::var("ERROR_DETAIL")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }
}
