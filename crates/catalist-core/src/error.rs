use thiserror::Error;

pub type CatalistResult<T> = Result<T, CatalistError>;

#[derive(Debug, Error)]
pub enum CatalistError {
    #[error("config error: {0}")]
    Config(String),

    #[error("document {id}: {field} present without {missing}")]
    MissingField {
        id: String,
        field: &'static str,
        missing: &'static str,
    },

    #[error("document error: {0}")]
    Document(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
