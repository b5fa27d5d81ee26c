/// How the image leg of a submit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Nothing was staged
    Skipped,
    Success(usize),
    Error(String),
}

/// Result of a save that went through. The images can still have failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub next_step: Option<u32>,
    pub images: UploadStatus,
}
