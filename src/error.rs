use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to load map: {0}")]
    MapLoad(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
