//! Structured run logging.
//!
//! Every processing run gets a `run_id` so interleaved log lines from the
//! pipeline, detector and encoder can be tied back to one input.

use tracing::{info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Logger for one processing run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    input: String,
}

impl RunLogger {
    /// Start a run with a fresh random id.
    pub fn new(input: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            input: input.to_string(),
        }
    }

    pub fn with_run_id(run_id: &str, input: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            input: input.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, input = %self.input, "Run started: {}", message);
    }

    /// Log a run state transition.
    pub fn log_state(&self, from: &str, to: &str) {
        info!(run_id = %self.run_id, from, to, "Run state changed");
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, input = %self.input, "Run warning: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, input = %self.input, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, input = %self.input)
    }
}

/// Install the global subscriber: plain colored output, or JSON when
/// `LOG_FORMAT=json`. `RUST_LOG` directives are honored.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vtrack=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
