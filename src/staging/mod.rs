mod hydrate;
mod list;
mod payload;
mod types;

pub use hydrate::{stream_images, FetchedImage, HydrationRequest, ImageFetcher, RawImage};
pub use list::StagingList;
pub use payload::{load_preview, ExportPayload, UPLOAD_FIELD};
pub use types::{
    AddReport, CandidateFile, EntryState, HydrationSummary, HydrationToken, ImageId, ListChange,
    LocalFile, Preview, RejectReason, Rejection, StagedImage, ACCEPTED_MEDIA_TYPES,
};
