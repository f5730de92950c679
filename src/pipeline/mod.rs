// Transform-load-rank pipeline: ingestion, processing, storage, and the orchestrator that sequences them

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;

pub use orchestrator::{PipelineOrchestrator, StageFlags, StageReport, StageStatus};
