//! Batch reference parsing
//!
//! Batch QR codes encode the public batch page URL, e.g.
//! `https://app.example/public/batch/17`. Anything containing
//! `batch/<digits>` is accepted; the digit run is the batch id.

use std::sync::LazyLock;

use regex::Regex;

/// Literal marker that precedes the batch id in a reference.
pub const BATCH_REFERENCE_MARKER: &str = "batch/";

static BATCH_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"batch/(\d+)").expect("batch reference pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Text is not a batch reference")]
    NotABatchReference,
}

/// Extract the batch id from decoded or typed text.
///
/// The first `batch/<digits>` occurrence wins. A digit run too large for an
/// `i64` is not a usable id and is rejected like any other non-reference.
pub fn parse_batch_reference(text: &str) -> Result<i64, ParseError> {
    let captures = BATCH_REFERENCE
        .captures(text)
        .ok_or(ParseError::NotABatchReference)?;
    captures[1]
        .parse::<i64>()
        .map_err(|_| ParseError::NotABatchReference)
}

/// Build the reference text a batch QR code carries.
pub fn batch_reference_url(base_url: &str, batch_id: i64) -> String {
    format!(
        "{}/public/{}{}",
        base_url.trim_end_matches('/'),
        BATCH_REFERENCE_MARKER,
        batch_id
    )
}
