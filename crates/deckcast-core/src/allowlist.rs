//! Static allow-list of hosts accepted as job input sources.

use std::collections::HashSet;

/// Hosts deckcast will accept as source material out of the box.
///
/// Covers the supported video platform, the audio platforms the podcast
/// generator understands, and the institutional archive.
const DEFAULT_DOMAINS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "www.youtu.be",
    "open.spotify.com",
    "soundcloud.com",
    "bbc.co.uk",
    "www.bbc.co.uk",
];

/// Fixed set of hostnames permitted in submitted URLs.
///
/// Checked case-insensitively against the host component of each URL.
/// Built once at process start; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AllowedDomainSet {
    hosts: HashSet<String>,
}

impl Default for AllowedDomainSet {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAINS.iter().copied())
    }
}

impl AllowedDomainSet {
    /// Build an allow-list from an iterator of hostnames.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list, e.g. from `DECKCAST_ALLOWED_DOMAINS`.
    /// Falls back to the defaults when the value is empty.
    pub fn from_csv(csv: &str) -> Self {
        let set = Self::new(csv.split(','));
        if set.hosts.is_empty() {
            Self::default()
        } else {
            set
        }
    }

    /// Whether the given host is allow-listed (case-insensitive).
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    /// The allow-listed hostnames, in arbitrary order.
    pub fn domains(&self) -> Vec<String> {
        self.hosts.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
