//! Error types for dependency resolution

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while matching, selecting, caching or resolving
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No declared member satisfies the supplied data
    #[error("{member} could not be matched with any public member on type {type_name}")]
    NoMatchFound { type_name: String, member: String },

    /// More than one declared member is a perfect match
    #[error("{member} is ambiguous, it could be matched with more than one member on type {type_name}")]
    AmbiguousMatch { type_name: String, member: String },

    /// The selected member violates an eligibility rule
    #[error("{member} on type '{type_name}' cannot be injected: {reason}")]
    InvalidMemberConfiguration {
        type_name: String,
        member: String,
        reason: String,
    },

    /// One configured injection member was bound to more than one registration
    #[error("Sharing {member} between registrations is not supported (bound to {bound}, requested {requested})")]
    SharedConfiguration {
        member: String,
        bound: String,
        requested: String,
    },

    /// Build lock could not be acquired in time
    #[error("Timed out after {timeout:?} waiting for the build lock")]
    LockTimeout { timeout: Duration },

    /// A pipeline was invoked before it was built
    #[error("Pipeline is not initialized")]
    UninitializedPipeline,

    /// The owning scope of a lifetime manager was reassigned
    #[error("This manager already registered with {current} scope")]
    ScopeAlreadySet { current: String },

    /// A per-scope manager was used without a scope
    #[error("Lifetime manager {manager} requires a lifetime container")]
    MissingScope { manager: &'static str },

    /// A slot already holds a different value and overwriting is forbidden
    #[error("Lifetime slot for {manager} already holds a different value")]
    ValueMismatch { manager: &'static str },

    /// Nothing is registered for the requested contract
    #[error("No registration for {contract}")]
    NotRegistered { contract: String },

    /// A contract depends on itself
    #[error("Circular dependency detected while resolving: {contract}")]
    CircularDependency { contract: String },

    /// A member invoker reported a failure
    #[error("Failed to invoke {member}: {reason}")]
    InvocationFailed { member: String, reason: String },

    /// The owning scope has been torn down
    #[error("Lifetime container {scope} has been disposed")]
    Disposed { scope: String },
}

impl ResolutionError {
    /// Create a NoMatchFound error
    #[inline]
    pub fn no_match(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::NoMatchFound {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Create an AmbiguousMatch error
    #[inline]
    pub fn ambiguous(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::AmbiguousMatch {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Create an InvalidMemberConfiguration error
    #[inline]
    pub fn invalid_member(
        type_name: impl Into<String>,
        member: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMemberConfiguration {
            type_name: type_name.into(),
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvocationFailed error
    #[inline]
    pub fn invocation_failed(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvocationFailed {
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// Only lock timeouts may succeed when the caller tries again.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_retryable() {
        let timeout = ResolutionError::LockTimeout {
            timeout: Duration::from_millis(10),
        };
        assert!(timeout.is_retryable());
        assert!(!ResolutionError::UninitializedPipeline.is_retryable());
        assert!(!ResolutionError::ambiguous("Foo", ".ctor(i32)").is_retryable());
    }

    #[test]
    fn test_messages_name_type_and_signature() {
        let err = ResolutionError::no_match("Service", ".ctor(i32, String)");
        let text = err.to_string();
        assert!(text.contains("Service"));
        assert!(text.contains(".ctor(i32, String)"));
    }
}
