/// Structs handed to whatever displays the results (the CLI's JSON output, for now).
/// Their field names become the JSON keys, so renaming them is a breaking change.

use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::ranking::{Prediction, RankedResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassificationOutcome
{
    pub request_id: String,
    /// Where the image came from, e.g. its path.
    pub source: String,
    pub result: Option<RankedResult>,
    /// Ranked predictions beyond the top two, when asked for.
    pub predictions: Vec<Prediction>,
    /// The user-facing message only; details go to the log.
    pub error: Option<String>,
}

impl ClassificationOutcome
{
    pub fn success(request_id: Uuid, source: &str, result: RankedResult, predictions: Vec<Prediction>) -> Self
    {
        ClassificationOutcome {
            request_id: request_id.to_string(),
            source: source.to_string(),
            result: Some(result),
            predictions,
            error: None,
        }
    }

    pub fn failure(request_id: Uuid, source: &str, error: &Error) -> Self
    {
        ClassificationOutcome {
            request_id: request_id.to_string(),
            source: source.to_string(),
            result: None,
            predictions: vec![],
            error: Some(error.user_message().to_string()),
        }
    }
}
