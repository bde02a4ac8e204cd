//! Docuflow workflow engine.
//!
//! Reacts to document lifecycle events (consumption, add, update, and
//! time-based schedules) by evaluating enabled workflows and applying their
//! merged actions to document metadata, permissions, and external
//! notifications:
//!
//! - [`WorkflowEngine`] — explicitly constructed engine object exposing
//!   [`WorkflowEngine::run_workflows`] and
//!   [`WorkflowEngine::evaluate_only`].
//! - [`executor`] — transactional change-set application plus
//!   fire-and-forget notification dispatch.
//! - [`sweep`] — the periodic SCHEDULED-trigger batch job.
//! - [`delivery`] — SMTP email and webhook transport channels.

pub mod delivery;
pub mod engine;
pub mod error;
pub mod executor;
pub mod notify;
pub mod sweep;

pub use engine::WorkflowEngine;
pub use error::EngineError;
pub use executor::AppliedResult;
pub use sweep::{sweep_once, SweepStats};
