use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthConfigurationError {
    #[error("environment variable {0} is not set")]
    MissingVariable(String),
    #[error("failed to read secret file {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("secret file {path:?} is not a JSON object: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("secret file {path:?} has no string entry {key:?}")]
    MissingKey { path: PathBuf, key: String },
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board {board_id} not found or not correctly permissioned")]
    Unavailable { board_id: String },
    #[error("unexpected board API payload: {0}")]
    Decode(String),
    #[error("board API returned errors: {0}")]
    Api(String),
    #[error("board API request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    Auth(#[from] AuthConfigurationError),
}

impl From<reqwest::Error> for BoardError {
    fn from(err: reqwest::Error) -> Self {
        BoardError::Transport(reqwest_middleware::Error::Reqwest(err))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ViewError {
    #[error("no regions in group {0:?}")]
    UnknownGroup(String),
    #[error("unknown attribute {0:?}")]
    UnknownAttribute(String),
}
