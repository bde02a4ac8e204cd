//! Error type shared by the pure domain modules.

/// Errors surfaced by the core domain logic.
///
/// `Config` is fatal: it means a stored workflow row no longer decodes into
/// the domain types (schema/version skew) and must propagate rather than
/// silently no-op. `Template` is recoverable: the affected sub-action is
/// skipped and siblings continue.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A stored trigger/action does not decode into the domain model.
    #[error("Invalid workflow configuration: {0}")]
    Config(String),

    /// A placeholder template failed to render.
    #[error("Template error: {0}")]
    Template(String),
}
