//! Database row structs and create/update DTOs.

pub mod document;
pub mod workflow;
pub mod workflow_run;
