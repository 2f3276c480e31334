//! Upstream header projection.
//!
//! # Responsibilities
//! - Copy allow-listed upstream headers into the gateway response
//! - Drop everything else
//!
//! # Design Decisions
//! - Names are matched case-insensitively (`HeaderName` is normalised)
//! - Only the first, non-empty value of each allowed header is copied

use http::{HeaderMap, HeaderName};

/// Parse configured header names into an allow-list.
///
/// Invalid names are skipped with a warning; config validation rejects them
/// before they get here.
pub fn allow_list<S: AsRef<str>>(names: &[S]) -> Vec<HeaderName> {
    let mut allowed: Vec<HeaderName> = Vec::with_capacity(names.len());
    for name in names {
        match HeaderName::from_bytes(name.as_ref().as_bytes()) {
            Ok(header) => {
                if !allowed.contains(&header) {
                    allowed.push(header);
                }
            }
            Err(_) => {
                tracing::warn!(header = name.as_ref(), "Ignoring invalid header name in allow-list");
            }
        }
    }
    allowed
}

/// Copy allow-listed headers with a non-empty value from `source`.
pub fn project_headers(allowed: &[HeaderName], source: &HeaderMap) -> HeaderMap {
    let mut projected = HeaderMap::with_capacity(allowed.len());
    for name in allowed {
        if let Some(value) = source.get(name) {
            if !value.is_empty() {
                projected.insert(name.clone(), value.clone());
            }
        }
    }
    projected
}
