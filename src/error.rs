//! Error types.
//!
//! Core stages report typed errors (`ParseError`, `ReconcileError`,
//! `ModelFitError`, `FetchError`). At the application boundary everything is
//! converted into `AppError`, which carries the process exit code:
//!
//! - 2: usage, configuration or file I/O problems
//! - 3: no usable data to reconcile
//! - 4: model fit failure
//! - 5: network/fetch failure

use thiserror::Error;

use crate::domain::{Period, VintageId};

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// A single snapshot could not be parsed. The snapshot is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("vintage {vintage}: no table section after {header_lines} header lines")]
    MissingTable { vintage: VintageId, header_lines: usize },
    #[error("vintage {vintage}: table section has {found} column(s), expected 2")]
    TooFewColumns { vintage: VintageId, found: usize },
    #[error("vintage {vintage}: unreadable row near line {line}: {message}")]
    Row {
        vintage: VintageId,
        line: u64,
        message: String,
    },
}

impl ParseError {
    pub fn vintage(&self) -> VintageId {
        match self {
            ParseError::MissingTable { vintage, .. }
            | ParseError::TooFewColumns { vintage, .. }
            | ParseError::Row { vintage, .. } => *vintage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("No usable monthly values in {vintages} parsed vintage(s); nothing to reconcile.")]
    Empty { vintages: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelFitError {
    #[error("Invalid forecast configuration: {0}")]
    InvalidConfig(String),
    #[error("Series is empty.")]
    EmptySeries,
    #[error("Insufficient history: need at least {required} monthly observations, found {actual}.")]
    InsufficientHistory { required: usize, actual: usize },
    #[error("Series has no value at its boundary period {period}; cannot anchor the model.")]
    MissingBoundaryValue { period: Period },
    #[error("Series is constant; seasonal decomposition is degenerate.")]
    ConstantSeries,
    #[error("Could not estimate the initial level/trend/seasonal state.")]
    InitialState,
    #[error("Parameter search did not converge within {iterations} iterations.")]
    NonConvergence { iterations: usize },
    #[error("Model produced non-finite values ({0}).")]
    NonFinite(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("Request to {url} failed with status {status}.")]
    Status { url: String, status: u16 },
    #[error("Failed to write '{path}': {message}")]
    Io { path: String, message: String },
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        AppError::new(3, err.to_string())
    }
}

impl From<ModelFitError> for AppError {
    fn from(err: ModelFitError) -> Self {
        AppError::new(4, format!("Forecast failed: {err}"))
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        let code = match err {
            FetchError::Io { .. } => 2,
            _ => 5,
        };
        AppError::new(code, err.to_string())
    }
}
