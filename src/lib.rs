pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod paths;
pub mod pipeline;
pub mod types;

pub use error::{PipelineError, Result};
