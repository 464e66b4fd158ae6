//! Video id extraction from YouTube-style URLs.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

const VIDEO_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "youtu.be", "www.youtu.be"];

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Known URL shapes: watch?v=, youtu.be/, embed/, v/
        Regex::new(r"(?:v=|youtu\.be/|embed/|v/|watch\?v=)([\w-]{11})")
            .unwrap_or_else(|e| panic!("invalid video id pattern: {e}"))
    })
}

/// Extract the 11-character video id from a video platform URL.
///
/// Returns `None` when the host is not a recognized video domain or no
/// id is present. The host comparison is case-insensitive.
pub fn extract_video_id(video_url: &str) -> Option<String> {
    let candidate = if video_url.contains("://") {
        video_url.to_string()
    } else {
        format!("https://{video_url}")
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if !VIDEO_HOSTS.contains(&host.as_str()) {
        return None;
    }

    video_id_pattern()
        .captures(&candidate)
        .map(|caps| caps[1].to_string())
}
