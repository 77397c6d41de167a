//! Utility functions for vigil-track.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock, PoisonError};

use log::warn;

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning message only once per process.
///
/// Subsequent calls with the same message are ignored. Returns whether the
/// message was emitted by this call.
pub fn warn_once(message: &str) -> bool {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let mut guard = warned.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.contains(message) {
        return false;
    }
    warn!("{}", message);
    guard.insert(message.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warn_once_emits_once() {
        let message = "utils test: this message is only logged once";
        assert!(warn_once(message));
        assert!(!warn_once(message));
        assert!(!warn_once(message));
    }

    #[test]
    fn test_warn_once_distinct_messages() {
        assert!(warn_once("utils test: first distinct message"));
        assert!(warn_once("utils test: second distinct message"));
    }
}
