use apex_database::DatabaseError;
use apex_kernel::error::ErrorCategory;
use apex_ladder::{LadderValidationError, LadderViolation};
use std::borrow::Cow;

/// A specialized [`PlacementError`] enum of this crate.
///
/// Every variant is returned before anything is written. Capacity conflicts are not
/// errors; they resolve to a waiting-list or displacement outcome.
#[apex_derive::apex_error]
pub enum PlacementError {
    /// Non-finite score or one outside `[0, 100]`.
    #[error("Invalid score{}: {message}", format_context(.context))]
    InvalidScore { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid request{}: {message}", format_context(.context))]
    InvalidRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The domain's thresholds in force do not form a complete ladder.
    #[error("Incomplete ladder{}: {message}", format_context(.context))]
    IncompleteLadder {
        message: Cow<'static, str>,
        violations: Vec<LadderViolation>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Domain not found{}: {message}", format_context(.context))]
    DomainNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Tier not found{}: {message}", format_context(.context))]
    TierNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Unknown candidate, or one not enrolled (or inactive) in the domain.
    #[error("Candidate not found{}: {message}", format_context(.context))]
    CandidateNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Already enrolled{}: {message}", format_context(.context))]
    AlreadyEnrolled { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The attempt id was already recorded for this domain; retrying will not help.
    #[error("Duplicate attempt{}: {message}", format_context(.context))]
    DuplicateAttempt { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Capacity below occupancy{}: {message}", format_context(.context))]
    CapacityBelowOccupancy { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Database error{}: {source}", format_context(.context))]
    Database { source: DatabaseError, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal placement error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl PlacementError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest { message: message.into(), context: None }
    }

    pub(crate) fn candidate_not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::CandidateNotFound { message: message.into(), context: None }
    }

    pub(crate) fn incomplete(err: LadderValidationError, domain: &str) -> Self {
        Self::IncompleteLadder {
            message: err.to_string().into(),
            violations: err.violations,
            context: Some(domain.to_owned().into()),
        }
    }

    /// Rewrites storage errors that have a placement meaning.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Self::Database { source: DatabaseError::NotFound { message, .. }, context } => {
                Self::DomainNotFound { message, context }
            },
            other => other,
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidScore { .. } | Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::DomainNotFound { .. }
            | Self::TierNotFound { .. }
            | Self::CandidateNotFound { .. } => ErrorCategory::NotFound,
            Self::IncompleteLadder { .. }
            | Self::AlreadyEnrolled { .. }
            | Self::DuplicateAttempt { .. }
            | Self::CapacityBelowOccupancy { .. } => ErrorCategory::Conflict,
            Self::Database { source, .. } => match source {
                DatabaseError::NotFound { .. } => ErrorCategory::NotFound,
                DatabaseError::Conflict { .. } | DatabaseError::Constraint { .. } => {
                    ErrorCategory::Conflict
                },
                DatabaseError::Validation { .. } => ErrorCategory::Validation,
                _ => ErrorCategory::Internal,
            },
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}
