use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GraphQL request failed: {status} (url: {url})")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("GraphQL errors: {0}")]
    GraphQl(String),
    #[error("Response has no data")]
    MissingData,
}
