//! Submission URL validation.
//!
//! Validation is all-or-nothing: one disallowed host rejects the whole
//! list before anything touches the queue.

use url::Url;

use crate::allowlist::AllowedDomainSet;

/// Rejection reasons for a submitted URL list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No non-blank entries survived.
    #[error("no URLs provided")]
    Empty,

    /// An entry could not be parsed as a URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// An entry's host is not on the allow-list.
    #[error("host not allowed: {0}")]
    DisallowedHost(String),
}

/// Validate newline-separated user input into a list of normalized URLs.
///
/// Blank lines are discarded. Entries without a scheme get `https://`
/// prefixed before parsing. Every surviving entry must have an
/// allow-listed host; the first offender fails the whole submission.
pub fn validate_urls(raw: &str, allowed: &AllowedDomainSet) -> Result<Vec<Url>, ValidationError> {
    let mut urls = Vec::new();

    for line in raw.lines() {
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }

        let candidate = if entry.contains("://") {
            entry.to_string()
        } else {
            format!("https://{entry}")
        };

        let url =
            Url::parse(&candidate).map_err(|_| ValidationError::InvalidUrl(entry.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| ValidationError::InvalidUrl(entry.to_string()))?;

        if !allowed.contains(host) {
            return Err(ValidationError::DisallowedHost(host.to_string()));
        }

        urls.push(url);
    }

    if urls.is_empty() {
        return Err(ValidationError::Empty);
    }

    Ok(urls)
}
