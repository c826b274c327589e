//! Registration errors.

use thiserror::Error;

/// Error returned while building a [`Router`](crate::Router).
///
/// These surface at startup, never during dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another handler already claims this prefix.
    #[error("prefix {prefix:?} is already claimed by the handler for {existing:?}")]
    DuplicatePrefix {
        /// The contested prefix.
        prefix: String,
        /// Usage hint of the handler that claimed it first.
        existing: String,
    },

    /// The handler claims no prefix, or an unusable one.
    #[error("invalid prefix {prefix:?}: {reason}")]
    InvalidPrefix {
        /// The offending prefix; empty when the handler claims none.
        prefix: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl RegistrationError {
    /// Creates a duplicate prefix error.
    pub fn duplicate_prefix(prefix: impl Into<String>, existing: impl Into<String>) -> Self {
        Self::DuplicatePrefix {
            prefix: prefix.into(),
            existing: existing.into(),
        }
    }

    /// Creates an invalid prefix error.
    pub fn invalid_prefix(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPrefix {
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RegistrationError::duplicate_prefix("/repo", "/repo owner/name");
        assert_eq!(
            err.to_string(),
            r#"prefix "/repo" is already claimed by the handler for "/repo owner/name""#
        );

        let err = RegistrationError::invalid_prefix("", "handler claims no prefixes");
        assert!(err.to_string().contains("claims no prefixes"));
    }
}
