// Domain logic with no I/O: URL validation against the host allow-list,
// video id extraction, and the leading-sentences summarizer. External
// collaborators (transcript retrieval) are traits defined here and
// implemented by the server crates.

pub mod allowlist;
pub mod summarize;
pub mod transcript;
pub mod urls;
pub mod video;

pub use allowlist::AllowedDomainSet;
pub use summarize::summarize_text;
pub use transcript::{TranscriptError, TranscriptSource};
pub use urls::{validate_urls, ValidationError};
pub use video::extract_video_id;
