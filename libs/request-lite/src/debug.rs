//! Verbose tracing switch.
//!
//! Setting `HTTP_DEBUG` to a whitespace-separated list that contains
//! `request-lite` turns on detailed dumps of options, prepared requests and
//! responses under the `request_lite::trace` target. The variable is read
//! once per process.

use std::sync::LazyLock;

/// Environment variable holding the list of enabled components
pub const DEBUG_ENV_VAR: &str = "HTTP_DEBUG";

/// Token in [`DEBUG_ENV_VAR`] that enables this crate's dumps
pub const DEBUG_TOKEN: &str = "request-lite";

/// Tracing target of the verbose dumps
pub const TRACE_TARGET: &str = "request_lite::trace";

static ENABLED: LazyLock<bool> = LazyLock::new(|| {
    let enabled = std::env::var(DEBUG_ENV_VAR).is_ok_and(|list| list_enables(&list));
    if enabled {
        tracing::debug!(target: TRACE_TARGET, "verbose request tracing enabled");
    }
    enabled
});

/// Whether verbose dumps are on for this process
#[must_use]
pub fn enabled() -> bool {
    *ENABLED
}

fn list_enables(list: &str) -> bool {
    list.split_whitespace().any(|token| token == DEBUG_TOKEN)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_list_enables() {
        assert!(list_enables("request-lite"));
        assert!(list_enables("hyper  request-lite\tother"));
        assert!(!list_enables(""));
        assert!(!list_enables("request-lite-extra"));
        assert!(!list_enables("request,lite"));
    }
}
