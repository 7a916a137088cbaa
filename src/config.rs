//! Resolver settings
//!
//! Settings are plain values handed to a [`Container`](crate::Container)
//! when it is created. The lock timeout is copied into every synchronized
//! lifetime manager the container builds, so two containers with different
//! settings never interfere.
//!
//! # Example
//!
//! ```rust
//! use dependency_resolver::{ResolveTimeout, ResolverSettings, SelectionMode};
//! use std::time::Duration;
//!
//! let settings = ResolverSettings::new()
//!     .validating()
//!     .timeout(Duration::from_secs(5));
//!
//! assert_eq!(settings.selection, SelectionMode::Validating);
//! assert_eq!(settings.lock_timeout, ResolveTimeout::Bounded(Duration::from_secs(5)));
//! ```

use crate::SelectionMode;
use crate::lifetime::{ResolveTimeout, default_resolve_timeout};

/// Container-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Mode used when a registration does not pick one
    pub selection: SelectionMode,
    /// Bound on waiting for another thread's build
    pub lock_timeout: ResolveTimeout,
}

impl ResolverSettings {
    /// Fast selection and the current process-wide lock timeout.
    pub fn new() -> Self {
        Self {
            selection: SelectionMode::Fast,
            lock_timeout: default_resolve_timeout(),
        }
    }

    /// Score every candidate and report ambiguity.
    pub fn validating(mut self) -> Self {
        self.selection = SelectionMode::Validating;
        self
    }

    /// Take the first matching candidate.
    pub fn fast(mut self) -> Self {
        self.selection = SelectionMode::Fast;
        self
    }

    pub fn selection(mut self, mode: SelectionMode) -> Self {
        self.selection = mode;
        self
    }

    /// Bound lock waits; pass [`ResolveTimeout::Infinite`] to wait forever.
    pub fn timeout(mut self, timeout: impl Into<ResolveTimeout>) -> Self {
        self.lock_timeout = timeout.into();
        self
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::new()
    }
}
