//! # Error Classifier
//!
//! Converts opaque lower-level failures into a [`RestError`]. All of the
//! string-matching heuristics against upstream error text live here so call
//! sites only say which context they were in.

use std::error::Error as StdError;
use thiserror::Error;

use crate::core::error::RestError;

/// Substring store drivers put in the error text when a lookup matched nothing
pub const NO_ROWS_SENTINEL: &str = "no rows in result set";

pub const MSG_NO_RECORD: &str = "no record matching given id";
pub const MSG_PROCESSING_REQUEST: &str = "error processing request";
pub const MSG_PARSING_STORE_RESPONSE: &str = "error parsing database response";

/// Typed "nothing matched" error for callers that can raise it directly
/// instead of relying on the sentinel text.
#[derive(Debug, Clone, Error)]
#[error("no rows in result set")]
pub struct RecordNotFound;

/// Classify a failure that happened while processing a request
pub fn classify(err: &(dyn StdError + 'static)) -> RestError {
    classify_with_fallback(err, MSG_PROCESSING_REQUEST)
}

/// Classify a failure that happened while decoding a store response
pub fn classify_store_response(err: &(dyn StdError + 'static)) -> RestError {
    classify_with_fallback(err, MSG_PARSING_STORE_RESPONSE)
}

fn classify_with_fallback(err: &(dyn StdError + 'static), fallback: &str) -> RestError {
    if let Some(rest_err) = find_rest_error(err) {
        return rest_err.clone();
    }

    if is_no_record(err) {
        return RestError::not_found(MSG_NO_RECORD).with_cause(Described(err.to_string()));
    }

    RestError::internal(fallback).with_cause(Described(err.to_string()))
}

/// Walk the source chain looking for an already classified error
fn find_rest_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a RestError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(rest_err) = e.downcast_ref::<RestError>() {
            return Some(rest_err);
        }
        current = e.source();
    }
    None
}

fn is_no_record(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<RecordNotFound>().is_some() || err.to_string().contains(NO_ROWS_SENTINEL)
}

/// Owned text snapshot of a borrowed error, so it can be nested as a cause
#[derive(Debug, Error)]
#[error("{0}")]
struct Described(String);
