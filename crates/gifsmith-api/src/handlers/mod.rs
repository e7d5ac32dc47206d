//! Request handlers.

pub mod artifacts;
pub mod health;
pub mod jobs;
pub mod stream;
pub mod upload;

pub use artifacts::*;
pub use health::*;
pub use jobs::*;
pub use stream::*;
pub use upload::*;

use gifsmith_models::JobId;

use crate::error::{ApiError, ApiResult};

/// Parse an untrusted path segment as a job ID. Anything that is not a
/// canonical ID maps to 404 before any filesystem access happens.
pub(crate) fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    JobId::parse(raw).map_err(|_| ApiError::not_found("unknown job"))
}
