//! Stateless repository structs, one per aggregate.

pub mod document_repo;
pub mod metadata_repo;
pub mod workflow_repo;
pub mod workflow_run_repo;

pub use document_repo::DocumentRepo;
pub use metadata_repo::{
    CorrespondentRepo, CustomFieldRepo, DocumentTypeRepo, GroupRepo, StoragePathRepo, TagRepo,
    UserRepo,
};
pub use workflow_repo::WorkflowRepo;
pub use workflow_run_repo::WorkflowRunRepo;
