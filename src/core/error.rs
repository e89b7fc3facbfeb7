//! Error taxonomy shared by the lifecycle, the resolver and the link validator

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by product-structure operations
#[derive(Debug, Error, Diagnostic)]
pub enum PlmError {
    /// A state-machine precondition was violated (checkout rules, cyclic
    /// assembly, duplicate cross-link, ...)
    #[error("Operation not allowed: {0}")]
    #[diagnostic(code(tplm::not_allowed))]
    NotAllowed(String),

    #[error("{kind} not found: {key}")]
    #[diagnostic(code(tplm::not_found))]
    NotFound { kind: &'static str, key: String },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(tplm::invalid_argument))]
    InvalidArgument(String),

    /// Deletion blocked by live references
    #[error("{entity} is still referenced by {referenced_by}")]
    #[diagnostic(
        code(tplm::entity_constraint),
        help("Remove the referencing usage links or products first")
    )]
    EntityConstraint {
        entity: String,
        referenced_by: String,
    },

    #[error("Access denied: {user} cannot read {key}")]
    #[diagnostic(code(tplm::access_denied))]
    AccessDenied { user: String, key: String },

    #[error("Path-to-path link of type '{link_type}' would create a cycle")]
    #[diagnostic(code(tplm::path_to_path_cyclic))]
    PathToPathCyclic { link_type: String },

    #[error("Baseline not found: {0}")]
    #[diagnostic(
        code(tplm::baseline_not_found),
        help("List baselines with 'tplm baseline list <product>'")
    )]
    BaselineNotFound(String),

    #[error("Product instance not found: {product}/{serial}")]
    #[diagnostic(code(tplm::product_instance_not_found))]
    ProductInstanceNotFound { product: String, serial: String },

    #[error("Invalid filter type: '{0}'")]
    #[diagnostic(
        code(tplm::invalid_filter_type),
        help("Use wip, latest, released, latest-released, pi-<serial> or a baseline id")
    )]
    InvalidFilterType(String),

    #[error("Failed to parse YAML in {file}: {message}")]
    #[diagnostic(code(tplm::yaml))]
    Yaml { file: String, message: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(tplm::io))]
    Io(#[from] std::io::Error),
}

impl PlmError {
    pub fn not_allowed(message: impl Into<String>) -> Self {
        PlmError::NotAllowed(message.into())
    }

    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        PlmError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PlmError::InvalidArgument(message.into())
    }

    /// True for the "lookup missed" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PlmError::NotFound { .. }
                | PlmError::BaselineNotFound(_)
                | PlmError::ProductInstanceNotFound { .. }
        )
    }
}

pub type PlmResult<T> = Result<T, PlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PlmError::not_found("part master", "BOLT-01");
        assert_eq!(err.to_string(), "part master not found: BOLT-01");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_allowed_is_not_a_lookup_miss() {
        let err = PlmError::not_allowed("revision is checked out");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("checked out"));
    }

    #[test]
    fn test_diagnostic_code() {
        let err = PlmError::InvalidFilterType("foo".to_string());
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("tplm::invalid_filter_type"));
    }
}
