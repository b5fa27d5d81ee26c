mod submit;
mod types;

pub use submit::{FollowUpBackend, SubmitProcessor};
pub use types::{SubmitOutcome, UploadStatus};
