use apex_domain::ids::EntityId;
use std::borrow::Cow;

const MAX_KEY_LEN: usize = 64;

#[apex_derive::apex_error]
pub enum ResourceGuardError {
    #[error("Resource validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Checks identifiers arriving from the outside world before they reach storage.
#[derive(Debug)]
pub struct ResourceGuard;

impl ResourceGuard {
    /// Parses `raw` as an id of entity `T`.
    ///
    /// Prevents id spoofing where a caller passes an id of another entity (a tier id to a
    /// candidate endpoint, say). A bare key is prefixed with `T::ENTITY`.
    ///
    /// # Errors
    /// Returns an error when the prefix names another entity, or the key is empty, longer
    /// than 64 characters, or contains anything besides ASCII alphanumerics, `-` and `_`.
    pub fn verify<T: EntityId>(raw: impl AsRef<str>) -> Result<T, ResourceGuardError> {
        let raw = raw.as_ref().trim();
        let key = match raw.split_once(':') {
            Some((entity, key)) if entity == T::ENTITY => key,
            Some((entity, _)) => {
                return Err(ResourceGuardError::Validation {
                    message: format!("Expected '{}', got '{entity}'", T::ENTITY).into(),
                    context: Some("ID entity mismatch".into()),
                });
            }
            None => raw,
        };

        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(ResourceGuardError::Validation {
                message: format!("'{raw}' must have a key of 1 to {MAX_KEY_LEN} characters").into(),
                context: Some(T::ENTITY.into()),
            });
        }
        if !key.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
            return Err(ResourceGuardError::Validation {
                message: format!("'{raw}' contains unsupported characters").into(),
                context: Some(T::ENTITY.into()),
            });
        }

        Ok(T::from(format!("{}:{key}", T::ENTITY)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_domain::ids::{CandidateId, TierId};

    #[test]
    fn test_id_verification() {
        // Correct entity
        let id: CandidateId = ResourceGuard::verify("candidate:ada").unwrap();
        assert_eq!(id.as_str(), "candidate:ada");

        // Auto-prefix
        let id: CandidateId = ResourceGuard::verify("ada").unwrap();
        assert_eq!(id.as_str(), "candidate:ada");

        // Mismatch
        assert!(ResourceGuard::verify::<CandidateId>("tier:dsa-1").is_err());
        assert!(ResourceGuard::verify::<TierId>("tier:dsa-1").is_ok());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(ResourceGuard::verify::<CandidateId>("candidate:").is_err());
        assert!(ResourceGuard::verify::<CandidateId>("a b").is_err());
        assert!(ResourceGuard::verify::<CandidateId>("x".repeat(65)).is_err());
    }
}
