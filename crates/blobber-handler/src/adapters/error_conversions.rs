//! Error conversions from store failures.
//!
//! Storage handlers use `?` on transaction calls; any engine failure they do
//! not handle themselves surfaces as `internal_error`.

use crate::domain::error::{HandlerError, StoreError};

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::internal(e.to_string())
    }
}
