// Video summary DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request for a synchronous video summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryRequest {
    pub video_url: String,
}

/// Transcript plus its leading-sentences summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    pub video_id: String,
    pub transcript: String,
    pub summary: String,
}
