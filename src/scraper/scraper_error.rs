use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Source error: {0}")]
    Source(String),
    #[error("HTML parse error: {0}")]
    HtmlParse(String),
    #[error("__NEXT_DATA__ not found")]
    MissingNextData,
    #[error("JSON parse error: {0}")]
    JsonParse(String),
    #[error("Unexpected data shape: {0}")]
    UnexpectedShape(String),
    #[error("Deserialize error: {0}")]
    Deserialize(String),
    #[error("IO error: {0}")]
    IoError(String),
}
