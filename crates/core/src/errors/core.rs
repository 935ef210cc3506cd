use thiserror::Error;

/// Core error type for the cinder bootstrap pipeline
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Definition '{name}' is already registered and overriding is not allowed")]
    DefinitionOverrideNotAllowed { name: String },

    #[error("Definition not found: {name}")]
    DefinitionNotFound { name: String },

    #[error("Circular import detected: {path}")]
    CircularImport { path: String },

    #[error("Post-processing already applied against {subject}")]
    AlreadyProcessed { subject: String },

    #[error("Cannot enhance definition '{name}': {reason}")]
    EnhancementFailed { name: String, reason: String },

    #[error("Unknown factory method '{method}' on '{type_name}'")]
    UnknownFactoryMethod { type_name: String, method: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Scan of '{base}' failed: {message}")]
    ScanFailed { base: String, message: String },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },
}

impl BootstrapError {
    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new definition-not-found error
    pub fn definition_not_found(name: impl Into<String>) -> Self {
        Self::DefinitionNotFound { name: name.into() }
    }

    /// Create a circular-import error from the chain of sources on the import stack
    pub fn circular_import(chain: &[String]) -> Self {
        Self::CircularImport {
            path: chain.join(" -> "),
        }
    }

    /// Create a new already-processed error
    pub fn already_processed(subject: impl Into<String>) -> Self {
        Self::AlreadyProcessed {
            subject: subject.into(),
        }
    }

    /// Create a new enhancement failure
    pub fn enhancement_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnhancementFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new scan failure
    pub fn scan_failed(base: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScanFailed {
            base: base.into(),
            message: message.into(),
        }
    }

    /// Check if the error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if the error is a circular import
    pub fn is_circular_import(&self) -> bool {
        matches!(self, Self::CircularImport { .. })
    }

    /// Check if the error is an already-processed guard failure
    pub fn is_already_processed(&self) -> bool {
        matches!(self, Self::AlreadyProcessed { .. })
    }

    /// Check if the error aborts the whole bootstrap (as opposed to a recoverable lookup miss)
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DefinitionNotFound { .. } | Self::DefinitionOverrideNotAllowed { .. }
        )
    }
}
