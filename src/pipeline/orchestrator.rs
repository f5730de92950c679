use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, instrument, warn};
use uuid::Uuid;

use crate::config::{Config, StoreSettings, TransformOverrides, TransformSettings};
use crate::error::{PipelineError, Result};
use crate::metrics;
use crate::paths::ArtifactPaths;
use crate::pipeline::ingestion::raw_source::{load_raw_records, RawFormat};
use crate::pipeline::processing::normalize::{normalize, ImputationSummary};
use crate::pipeline::processing::project::project;
use crate::pipeline::processing::rank::RankEngine;
use crate::pipeline::storage::artifacts::{read_clean_artifact, write_clean_artifact};
use crate::pipeline::storage::tabular_store::TabularStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Normalize raw records and write the clean artifact
    Transform,
    /// Load the clean artifact, derive categories, rank and export
    LoadRank,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::LoadRank => "load_rank",
        }
    }
}

/// Stages the caller asked to bypass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageFlags {
    pub skip_transform: bool,
    pub skip_load: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub records: usize,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    pub imputation: ImputationSummary,
    pub clean_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRankOutcome {
    pub rows_loaded: usize,
    pub categories_derived: usize,
    pub rows_ranked: usize,
    pub database_path: PathBuf,
    pub ranked_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Transform(TransformOutcome),
    LoadRank(LoadRankOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed(StageOutcome),
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Sequences transform then load + rank, communicating only through artifacts on disk.
pub struct PipelineOrchestrator {
    transform: TransformSettings,
    store: StoreSettings,
    raw_format: RawFormat,
}

impl PipelineOrchestrator {
    pub fn new(transform: TransformSettings, store: StoreSettings) -> Self {
        Self {
            transform,
            store,
            raw_format: RawFormat::default(),
        }
    }

    pub fn from_config(config: &Config, overrides: &TransformOverrides) -> Self {
        Self::new(config.transform_settings(overrides), config.store_settings())
    }

    pub fn with_raw_format(mut self, raw_format: RawFormat) -> Self {
        self.raw_format = raw_format;
        self
    }

    /// Run every stage not flagged as skipped, in order.
    ///
    /// The first failure aborts the remaining stages. Artifacts written by earlier stages
    /// are left in place.
    pub fn run(&self, flags: StageFlags, paths: &ArtifactPaths) -> Result<Vec<StageReport>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _enter = span.enter();

        info!(raw = %paths.raw.display(), clean = %paths.clean.display(),
              database = %paths.database.display(), ranked = %paths.ranked.display(),
              "Pipeline settings");

        let mut reports = Vec::with_capacity(2);

        reports.push(self.run_stage(Stage::Transform, flags.skip_transform, &paths.raw, || {
            self.run_transform(&paths.raw, &paths.clean)
                .map(StageOutcome::Transform)
        })?);

        reports.push(self.run_stage(Stage::LoadRank, flags.skip_load, &paths.clean, || {
            self.run_load_rank(&paths.clean, &paths.database, &paths.ranked)
                .map(StageOutcome::LoadRank)
        })?);

        info!("Pipeline completed successfully");
        Ok(reports)
    }

    fn run_stage(
        &self,
        stage: Stage,
        skip: bool,
        input: &Path,
        body: impl FnOnce() -> Result<StageOutcome>,
    ) -> Result<StageReport> {
        let started_at = Utc::now();
        if skip {
            info!("Skipping {} stage", stage.name());
            return Ok(StageReport {
                stage,
                status: StageStatus::Skipped,
                started_at,
                elapsed: Duration::ZERO,
            });
        }

        let timer = Instant::now();
        match body() {
            Ok(outcome) => {
                let elapsed = timer.elapsed();
                metrics::record_stage_duration(stage.name(), elapsed.as_secs_f64());
                Ok(StageReport {
                    stage,
                    status: StageStatus::Completed(outcome),
                    started_at,
                    elapsed,
                })
            }
            Err(e) => {
                metrics::record_stage_failure(stage.name());
                let path = failing_path(&e).unwrap_or(input).to_path_buf();
                error!(stage = stage.name(), path = %path.display(), error = %e, "Stage failed");
                Err(e.in_stage(stage.name(), path))
            }
        }
    }

    /// Normalize the raw artifact and write the clean artifact.
    #[instrument(skip_all, fields(raw = %raw_path.display(), clean = %clean_path.display()))]
    pub fn run_transform(&self, raw_path: &Path, clean_path: &Path) -> Result<TransformOutcome> {
        info!("Starting data transformation from {}", raw_path.display());
        let raw = load_raw_records(raw_path, self.raw_format)?;

        let batch = normalize(
            &raw,
            self.transform.default_rating,
            self.transform.default_user_ratings_total,
        );
        let projection = project(&batch, &self.transform.columns);
        if projection.table.columns.is_empty() {
            return Err(PipelineError::EmptyProjection {
                configured: self.transform.columns.clone(),
            });
        }
        write_clean_artifact(clean_path, &projection.table)?;

        Ok(TransformOutcome {
            records: batch.records.len(),
            columns: projection.table.columns,
            missing_columns: projection.missing_columns,
            imputation: batch.imputation,
            clean_path: clean_path.to_path_buf(),
        })
    }

    /// Load the clean artifact into the database, derive `main_type`, rank and export.
    #[instrument(skip_all, fields(clean = %clean_path.display(), db = %database_path.display()))]
    pub fn run_load_rank(
        &self,
        clean_path: &Path,
        database_path: &Path,
        ranked_path: &Path,
    ) -> Result<LoadRankOutcome> {
        info!("Loading cleaned data from {}", clean_path.display());
        if !clean_path.exists() {
            return Err(PipelineError::SourceNotFound {
                path: clean_path.to_path_buf(),
            });
        }
        let table = read_clean_artifact(clean_path)?;

        let mut store = TabularStore::open(database_path, self.store.clone())?;
        let rows_loaded = store.load(&table)?;
        let categories_derived = store.derive_category()?;

        let engine = RankEngine::new(&store);
        let ranked = engine.rank()?;
        if ranked.is_empty() {
            warn!("No places to rank");
        }
        engine.export(&ranked, ranked_path)?;

        Ok(LoadRankOutcome {
            rows_loaded,
            categories_derived,
            rows_ranked: ranked.len(),
            database_path: database_path.to_path_buf(),
            ranked_path: ranked_path.to_path_buf(),
        })
    }
}

/// Path named by the error itself, when it names one
fn failing_path(err: &PipelineError) -> Option<&Path> {
    match err {
        PipelineError::MissingInput { path }
        | PipelineError::SourceNotFound { path }
        | PipelineError::Persistence { path, .. }
        | PipelineError::Stage { path, .. } => Some(path.as_path()),
        _ => None,
    }
}
