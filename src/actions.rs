//! Actions and messages for async app operations
use crate::api::Station;
use crate::error::{ApiError, GeoError};

// Requests from UI/controller to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Search { id: u64, term: String },
    Suggest { ticket: u64, term: String },
    Locate { id: u64 },
}

// Responses from worker back to UI/controller
#[derive(Debug)]
pub enum Response {
    StationsLoaded { id: u64, term: String, result: Result<Vec<Station>, ApiError> },
    SuggestionsLoaded { ticket: u64, result: Result<Vec<String>, ApiError> },
    /// A position is available; the country lookup is under way.
    Located { id: u64 },
    CountryResolved { id: u64, result: Result<Option<String>, GeoError> },
}
