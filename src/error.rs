//! Error types for the fetch pipeline.

use crate::gh::PrState;
use thiserror::Error;

/// Errors raised while reading pull requests from the GitHub REST API
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("request for {state} pull requests failed: {source}")]
    Transport {
        state: PrState,
        #[source]
        source: reqwest::Error,
    },

    /// GitHub answered with a non-success status
    #[error("GitHub returned HTTP {status} for {state} pull requests")]
    Status { state: PrState, status: u16 },

    /// The body was not the expected JSON array
    #[error("could not decode {state} pull requests: {source}")]
    Decode {
        state: PrState,
        #[source]
        source: reqwest::Error,
    },

    /// Building the request URL or the HTTP client failed
    #[error("GitHub client setup failed: {0}")]
    Setup(String),
}

/// Errors raised by token sources
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned HTTP {0}")]
    Status(u16),

    #[error("token source returned an empty token")]
    Empty,

    #[error("{0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to run gh cli: {0}")]
    Command(String),

    #[error("no token source produced a token")]
    Exhausted,
}

/// Errors raised by the on-disk pull request cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised before git could report anything itself
#[derive(Error, Debug)]
pub enum CloneError {
    #[error("cannot derive a directory name from clone URL {0:?}")]
    BadUrl(String),

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
}
