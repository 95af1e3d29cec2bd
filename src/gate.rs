// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Access gate for window queries.

/// A window may be disclosed only when the feature is on and the caller's
/// identity was verified.
pub fn allow(feature_enabled: bool, identity_verified: bool) -> bool {
    feature_enabled && identity_verified
}

/// Returns `window` when allowed, an empty sequence otherwise.
pub fn disclose<T>(feature_enabled: bool, identity_verified: bool, window: Vec<T>) -> Vec<T> {
    if allow(feature_enabled, identity_verified) {
        window
    } else {
        Vec::new()
    }
}
