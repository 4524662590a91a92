//! The load → fetch → push sequence for one run.
//!
//! ```text
//! Idle → Loading → Fetching → Pushing → Done
//!           └─────────┴──────────┴────→ Failed
//! ```
//!
//! A failure skips every later stage. There is no resume: the next run
//! starts again from `Idle`.

use crate::backend::Backend;
use crate::cli::RunArgs;
use crate::config::{self, AppConfig};
use crate::error::DbpushError;
use crate::logging::Timer;
use crate::metrics;
use crate::push::PushClient;
use std::fmt;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loading,
    Fetching,
    Pushing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Loading => "loading",
            Stage::Fetching => "fetching",
            Stage::Pushing => "pushing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub rows: usize,
    pub samples: usize,
}

/// Tracks one run through its stages.
#[derive(Debug)]
pub struct Run {
    stage: Stage,
    failed_at: Option<Stage>,
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

impl Run {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            failed_at: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The stage that was active when the run failed.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    fn enter(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }

    fn fail(&mut self, err: DbpushError) -> DbpushError {
        error!(stage = %self.stage, error = %err, "run failed");
        self.failed_at = Some(self.stage);
        self.stage = Stage::Failed;
        err
    }

    /// Loading: build the immutable configuration.
    pub fn load(&mut self, args: &RunArgs, show_secrets: bool) -> Result<AppConfig, DbpushError> {
        self.enter(Stage::Loading);
        match config::load(args, show_secrets) {
            Ok(config) => {
                debug!(config = %config.describe(), "configuration loaded");
                Ok(config)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Fetching, then Pushing. The push only happens once the whole result
    /// has been fetched and mapped.
    pub async fn fetch_and_push<B: Backend>(
        &mut self,
        config: &AppConfig,
        backend: &B,
    ) -> Result<RunReport, DbpushError> {
        match self.fetch_and_push_inner(config, backend).await {
            Ok(report) => {
                self.enter(Stage::Done);
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn fetch_and_push_inner<B: Backend>(
        &mut self,
        config: &AppConfig,
        backend: &B,
    ) -> Result<RunReport, DbpushError> {
        let pusher = PushClient::new(&config.gateway)?;

        self.enter(Stage::Fetching);
        let timer = Timer::start();
        let result = backend.fetch(&config.source.query).await?;
        info!(
            rows = result.rows.len(),
            elapsed_ms = timer.elapsed_ms(),
            "query complete"
        );

        self.enter(Stage::Pushing);
        let payload = metrics::build_payload(&result, &config.source, &config.gateway.static_labels)?;
        let samples = payload.sample_count();

        let timer = Timer::start();
        pusher.push(&payload).await?;
        info!(
            endpoint = %pusher.display_endpoint(),
            samples,
            elapsed_ms = timer.elapsed_ms(),
            "metrics pushed"
        );

        Ok(RunReport {
            rows: result.rows.len(),
            samples,
        })
    }
}
