//! The import pipeline: one notification in, staged loads out, then acknowledge.
//!
//! - [`seams`]: the four injected collaborators
//! - [`orchestrator`]: one receive → resolve → transport → load → acknowledge cycle
//! - [`runner`]: the loop around cycles, with graceful shutdown
//! - [`factory`]: wiring from [`ferry_core::Config`]

pub mod error;
pub mod factory;
pub mod orchestrator;
pub mod runner;
pub mod seams;

pub use error::{ErrorKind, PipelineError, Result};
pub use factory::{build, build_with, Pipeline};
pub use orchestrator::{CycleOutcome, Orchestrator};
pub use runner::{RunOptions, RunSummary, Runner};
pub use seams::{MessageSource, ObjectCopier, Router, WarehouseLoader};
