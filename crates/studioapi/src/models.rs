use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub image_url: Option<String>,
}

/// Error body FastAPI-style services return alongside non-2xx statuses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
}
