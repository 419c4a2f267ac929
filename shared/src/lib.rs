pub mod admin_service;
pub mod http;

#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}
