use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTO for sanitizing a single document.
#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub html: String,
}

/// DTO for sanitizing several documents in one request.
#[derive(Debug, Deserialize, Validate)]
pub struct BatchSanitizeRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "documents must contain between 1 and 100 entries"
    ))]
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SanitizeResponse {
    pub html: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchSanitizeResponse {
    pub documents: Vec<String>,
}
