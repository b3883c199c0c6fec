use crate::validator::{LadderValidationError, LadderViolation};
use apex_database::DatabaseError;
use apex_kernel::error::ErrorCategory;
use std::borrow::Cow;

/// A specialized [`LadderError`] enum of this crate.
#[apex_derive::apex_error]
pub enum LadderError {
    /// A proposed ladder failed validation; nothing was stored.
    #[error("Invalid ladder{}: {source}", format_context(.context))]
    InvalidLadder { source: LadderValidationError, context: Option<Cow<'static, str>> },

    /// The stored ladder in force is not complete, so no placement can use it.
    #[error("Incomplete ladder{}: {message}", format_context(.context))]
    IncompleteLadder {
        message: Cow<'static, str>,
        violations: Vec<LadderViolation>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Domain already exists{}: {message}", format_context(.context))]
    DomainExists { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Domain not found{}: {message}", format_context(.context))]
    DomainNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Domain in use{}: {message}", format_context(.context))]
    DomainInUse { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid request{}: {message}", format_context(.context))]
    InvalidRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Seed document error{}: {source}", format_context(.context))]
    Seed { source: toml::de::Error, context: Option<Cow<'static, str>> },

    #[error("Database error{}: {source}", format_context(.context))]
    Database { source: DatabaseError, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal ladder error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl LadderError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest { message: message.into(), context: None }
    }

    pub(crate) fn incomplete(err: LadderValidationError) -> Self {
        Self::IncompleteLadder {
            message: err.to_string().into(),
            violations: err.violations,
            context: None,
        }
    }

    /// Rewrites storage errors that have a domain meaning.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Self::Database { source: DatabaseError::NotFound { message, .. }, context } => {
                Self::DomainNotFound { message, context }
            },
            Self::Database { source: DatabaseError::Constraint { message, .. }, context } => {
                Self::DomainInUse { message, context }
            },
            Self::Database { source: DatabaseError::Conflict { message, .. }, context } => {
                Self::DomainExists { message, context }
            },
            other => other,
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidLadder { .. } | Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::IncompleteLadder { .. }
            | Self::DomainExists { .. }
            | Self::DomainInUse { .. } => ErrorCategory::Conflict,
            Self::DomainNotFound { .. } => ErrorCategory::NotFound,
            Self::Database { source, .. } => match source {
                DatabaseError::NotFound { .. } => ErrorCategory::NotFound,
                DatabaseError::Conflict { .. } | DatabaseError::Constraint { .. } => {
                    ErrorCategory::Conflict
                },
                DatabaseError::Validation { .. } => ErrorCategory::Validation,
                _ => ErrorCategory::Internal,
            },
            Self::Seed { .. } | Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}
