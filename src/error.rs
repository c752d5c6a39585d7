use thiserror::Error;

/// Failure to retrieve a source payload after the retry budget is spent.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error while downloading: {0}")]
    Io(#[from] std::io::Error),

    #[error("All {attempts} download attempts failed for {url}: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("No endpoint configured for source {0}")]
    NoEndpoint(String),
}

/// The payload could not be read as an XML document at all.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("XML document has no root element")]
    MissingRoot,

    #[error("Unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot { expected: String, found: String },
}

/// Reason a single upstream record was dropped. Never escapes an adapter.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No name could be extracted for {0}")]
    MissingName(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("No source data could be loaded from: {0}")]
    NoSources(String),

    #[error("Failed to write unified dataset: {0}")]
    Write(#[from] WriteError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SanctionsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No parseable records for source {0}")]
    NoRecords(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, SanctionsError>;
