//! Source of the pattern served by `GET /target`.

use std::fmt;
use std::sync::Arc;

/// Environment variable overriding the served pattern.
pub const TARGET_ENV: &str = "VKG_TARGET";

/// Pattern served when no override is set.
pub const DEFAULT_TARGET: &str = r"(?i)[\/\+](nugget|slacker|wheelsdown|hollowoak|ferrari|porsche|gt3rs|portofino|longhorn|miata|equiraptor|nugget-info|vanitykey|vanity-nugget)=?$";

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Computes the current pattern on every call; holds no state of its own.
#[derive(Clone)]
pub struct TargetProvider {
    lookup: Arc<Lookup>,
}

impl TargetProvider {
    /// Reads the override from the process environment.
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the override through `lookup` instead of the environment.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Returns the override, or the default when it is unset or empty.
    pub fn current(&self) -> String {
        match (self.lookup)(TARGET_ENV) {
            Some(target) if !target.is_empty() => target,
            _ => DEFAULT_TARGET.to_string(),
        }
    }
}

impl fmt::Debug for TargetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetProvider").finish_non_exhaustive()
    }
}
