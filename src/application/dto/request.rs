//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::domain::{Direction, PageParams};
use crate::shared::error::AppError;

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Text must be 1-4000 characters"))]
    pub text: String,
}

/// History query string: `?before=..` or `?after=..`, plus `offset` and
/// `limit`. Timestamps are RFC 3339.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub direction: Option<Direction>,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    /// Resolve the query into page parameters. `before` and `after` are
    /// mutually exclusive; either one implies its direction.
    pub fn into_params(self, default_limit: u32) -> Result<PageParams, AppError> {
        let (direction, reference) = match (self.before, self.after) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Use either before or after, not both".into(),
                ))
            }
            (Some(at), None) => (Direction::Before, Some(at)),
            (None, Some(at)) => (Direction::After, Some(at)),
            (None, None) => (self.direction.unwrap_or_default(), None),
        };

        if self.direction.is_some_and(|d| d != direction) {
            return Err(AppError::BadRequest(
                "direction conflicts with the reference timestamp".into(),
            ));
        }

        Ok(PageParams {
            direction,
            reference,
            offset: self.offset.unwrap_or(0),
            limit: self.limit.unwrap_or(default_limit),
        })
    }
}
