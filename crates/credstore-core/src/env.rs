//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Common environment variable names.
pub mod vars {
    /// credstore home directory override.
    pub const CREDSTORE_HOME: &str = "CREDSTORE_HOME";

    /// credstore config file override.
    pub const CREDSTORE_CONFIG: &str = "CREDSTORE_CONFIG";

    /// Store directory override (takes precedence over the config file).
    pub const CREDSTORE_STORE_DIR: &str = "CREDSTORE_STORE_DIR";

    /// credstore log filter.
    pub const CREDSTORE_LOG: &str = "CREDSTORE_LOG";
}
