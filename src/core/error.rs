//! Error types for the sync engine

use thiserror::Error;

/// Why a fetch for one entity produced no usable rows.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("provider error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("no usable data returned")]
    NoData,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read rows: {0}")]
    Read(#[source] anyhow::Error),

    #[error("failed to write rows: {0}")]
    Write(#[source] anyhow::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid date '{input}': expected YYYY-MM-DD or DD-Mon-YYYY")]
pub struct DateParseError {
    pub input: String,
}
