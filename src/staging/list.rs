use super::hydrate::{stream_images, FetchedImage, HydrationRequest, ImageFetcher};
use super::payload::ExportPayload;
use super::types::{
    AddReport, CandidateFile, HydrationSummary, HydrationToken, ImageId, ListChange, LocalFile,
    Preview, RejectReason, Rejection, StagedImage,
};
use crate::config::DEFAULT_MAX_IMAGE_BYTES;

/// Ordered collection of images waiting to be uploaded, plus the ones
/// already stored on the server for the current follow-up.
///
/// The list never renders anything itself. Every mutation is recorded as a
/// [`ListChange`] that a renderer drains with [`StagingList::drain_changes`].
#[derive(Debug)]
pub struct StagingList {
    images: Vec<StagedImage>,
    max_file_size: u64,
    next_id: u64,
    generation: u64,
    changes: Vec<ListChange>,
}

impl Default for StagingList {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_BYTES)
    }
}

impl StagingList {
    pub fn new(max_file_size: u64) -> Self {
        Self {
            images: Vec::new(),
            max_file_size,
            next_id: 1,
            generation: 0,
            changes: Vec::new(),
        }
    }

    pub fn images(&self) -> &[StagedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, id: ImageId) -> Option<&StagedImage> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn local_file(&self, id: ImageId) -> Option<&LocalFile> {
        self.get(id).and_then(|img| img.source.as_ref())
    }

    fn allocate_id(&mut self) -> ImageId {
        let id = ImageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Validates and appends candidates in input order. Previews are left
    /// pending; the caller reads the files and calls [`Self::attach_preview`].
    pub fn add<I>(&mut self, candidates: I) -> AddReport
    where
        I: IntoIterator<Item = CandidateFile>,
    {
        let mut report = AddReport::default();

        for candidate in candidates {
            let reason = if !candidate.has_accepted_type() {
                Some(RejectReason::UnsupportedType)
            } else if candidate.size > self.max_file_size {
                Some(RejectReason::TooLarge)
            } else if self
                .images
                .iter()
                .any(|img| img.name == candidate.name && img.size == candidate.size)
            {
                Some(RejectReason::Duplicate)
            } else {
                None
            };

            if let Some(reason) = reason {
                tracing::debug!("Rejected {} ({:?})", candidate.name, reason);
                report.rejected.push(Rejection {
                    name: candidate.name,
                    reason,
                });
                continue;
            }

            let id = self.allocate_id();
            let media_type = candidate.media_type.unwrap_or_default();
            self.images.push(StagedImage {
                id,
                name: candidate.name.clone(),
                size: candidate.size,
                preview: None,
                source: Some(LocalFile {
                    path: candidate.path,
                    name: candidate.name,
                    media_type,
                    size: candidate.size,
                }),
            });
            self.changes.push(ListChange::Added(id));
            report.accepted.push(id);
        }

        report
    }

    /// Returns false when the entry was removed before its preview arrived.
    pub fn attach_preview(&mut self, id: ImageId, preview: Preview) -> bool {
        match self.images.iter_mut().find(|img| img.id == id) {
            Some(image) => {
                image.preview = Some(preview);
                self.changes.push(ListChange::PreviewReady(id));
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ImageId) -> bool {
        let before = self.images.len();
        self.images.retain(|img| img.id != id);
        if self.images.len() == before {
            return false;
        }
        self.changes.push(ListChange::Removed(id));
        true
    }

    /// Empties the list once `confirm` agrees. An empty list never asks.
    pub fn clear_all<C>(&mut self, confirm: C) -> bool
    where
        C: FnOnce(usize) -> bool,
    {
        if self.images.is_empty() {
            return false;
        }
        if !confirm(self.images.len()) {
            return false;
        }
        self.clear();
        true
    }

    /// Unconditional clear, used after a successful upload.
    pub fn clear(&mut self) {
        self.images.clear();
        self.changes.push(ListChange::Cleared);
    }

    /// Starts a destructive refresh: the list is cleared and every earlier
    /// token stops being accepted by [`Self::apply_hydrated`].
    pub fn begin_hydration(&mut self) -> HydrationToken {
        self.generation += 1;
        self.clear();
        HydrationToken(self.generation)
    }

    pub fn is_current(&self, token: HydrationToken) -> bool {
        token.0 == self.generation
    }

    pub fn apply_hydrated(&mut self, token: HydrationToken, image: FetchedImage) -> bool {
        if !self.is_current(token) {
            tracing::debug!("Dropping stale image {} from an older load", image.name);
            return false;
        }
        if self
            .images
            .iter()
            .any(|img| !img.is_local() && img.name == image.name)
        {
            return false;
        }

        let id = self.allocate_id();
        self.images.push(StagedImage {
            id,
            source: None,
            size: image.bytes.len() as u64,
            preview: Some(Preview::new(image.content_type, image.bytes)),
            name: image.name,
        });
        self.changes.push(ListChange::Added(id));
        true
    }

    /// Replaces the list with the images stored on the server. Fetches run
    /// concurrently and land in completion order; failures are logged and
    /// counted, never returned.
    pub async fn hydrate<F>(&mut self, fetcher: &F, request: &HydrationRequest) -> HydrationSummary
    where
        F: ImageFetcher + ?Sized,
    {
        let token = self.begin_hydration();
        let mut loaded = 0;
        let failed = stream_images(fetcher, request, |image| {
            if self.apply_hydrated(token, image) {
                loaded += 1;
            }
        })
        .await;
        HydrationSummary { loaded, failed }
    }

    /// Local files in list order. Server images are never re-uploaded.
    pub fn export_payload(&self) -> ExportPayload {
        ExportPayload::new(
            self.images
                .iter()
                .filter_map(|img| img.source.clone())
                .collect(),
        )
    }

    pub fn drain_changes(&mut self) -> Vec<ListChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, Result};
    use crate::staging::hydrate::RawImage;
    use crate::staging::EntryState;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn jpeg(name: &str, size: u64) -> CandidateFile {
        CandidateFile::new(format!("/fotos/{}", name), size, Some("image/jpeg"))
    }

    fn fetched(name: &str) -> FetchedImage {
        FetchedImage {
            name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: Arc::from(vec![0xFFu8, 0xD8, 0xFF]),
        }
    }

    /// Serves canned responses per path, optionally after a delay.
    #[derive(Default)]
    struct FakeFetcher {
        responses: HashMap<String, (u64, std::result::Result<&'static str, u16>)>,
    }

    impl FakeFetcher {
        fn ok(mut self, path: &str, content_type: &'static str, delay_ms: u64) -> Self {
            self.responses
                .insert(path.to_string(), (delay_ms, Ok(content_type)));
            self
        }

        fn status(mut self, path: &str, status: u16) -> Self {
            self.responses.insert(path.to_string(), (0, Err(status)));
            self
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch_image(&self, path: &str) -> Result<RawImage> {
            let (delay, response) = self
                .responses
                .get(path)
                .cloned()
                .unwrap_or((0, Err(404)));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match response {
                Ok(content_type) => Ok(RawImage {
                    content_type: content_type.to_string(),
                    bytes: Arc::from(vec![1u8, 2, 3, 4]),
                }),
                Err(status) => Err(ClientError::Server {
                    status,
                    message: "Imagen no encontrada".to_string(),
                }),
            }
        }
    }

    fn request(names: &str) -> HydrationRequest {
        HydrationRequest::new("documento_100_1001", "seguimiento_2", names, "/image")
    }

    const A: &str = "/seguimientos/image/documento_100_1001/seguimiento_2/a.jpg";
    const B: &str = "/seguimientos/image/documento_100_1001/seguimiento_2/b.jpg";

    #[test]
    fn test_unsupported_type_never_listed() {
        let mut list = StagingList::default();
        let report = list.add(vec![
            CandidateFile::new("/docs/acta.pdf", 100, Some("application/pdf")),
            CandidateFile::new("/docs/sin_tipo", 100, None),
        ]);

        assert!(list.is_empty());
        assert_eq!(report.rejected.len(), 2);
        assert!(report
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::UnsupportedType));
    }

    #[test]
    fn test_size_ceiling() {
        let mut list = StagingList::default();
        let report = list.add(vec![jpeg("grande.jpg", 5_242_881), jpeg("justo.jpg", 5_242_880)]);

        assert_eq!(list.len(), 1);
        assert_eq!(list.images()[0].name, "justo.jpg");
        assert_eq!(report.rejected[0].reason, RejectReason::TooLarge);
    }

    #[test]
    fn test_duplicate_name_and_size() {
        let mut list = StagingList::default();
        let report = list.add(vec![jpeg("casa.jpg", 2048), jpeg("casa.jpg", 2048)]);
        assert_eq!(list.len(), 1);
        assert_eq!(report.rejected[0].reason, RejectReason::Duplicate);

        // same name, different size is a different file
        list.add(vec![jpeg("casa.jpg", 4096)]);
        assert_eq!(list.len(), 2);

        let report = list.add(vec![jpeg("casa.jpg", 2048)]);
        assert_eq!(list.len(), 2);
        assert_eq!(report.accepted.len(), 0);
    }

    #[test]
    fn test_add_keeps_input_order_and_records_changes() {
        let mut list = StagingList::default();
        let report = list.add(vec![jpeg("1.jpg", 1), jpeg("2.jpg", 2), jpeg("3.jpg", 3)]);

        let names: Vec<_> = list.images().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["1.jpg", "2.jpg", "3.jpg"]);
        assert_eq!(
            list.drain_changes(),
            report
                .accepted
                .iter()
                .map(|id| ListChange::Added(*id))
                .collect::<Vec<_>>()
        );
        assert!(list.drain_changes().is_empty());
    }

    #[test]
    fn test_preview_attaches_later() {
        let mut list = StagingList::default();
        let id = list.add(vec![jpeg("a.jpg", 3)]).accepted[0];
        assert_eq!(list.get(id).unwrap().state(), EntryState::PendingPreview);

        assert!(list.attach_preview(id, Preview::new("image/jpeg", vec![1u8, 2, 3])));
        let image = list.get(id).unwrap();
        assert_eq!(image.state(), EntryState::Ready);
        assert_eq!(image.preview.as_ref().unwrap().media_type, "image/jpeg");

        list.remove(id);
        assert!(!list.attach_preview(id, Preview::new("image/jpeg", vec![1u8])));
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let mut list = StagingList::default();
        let id = list.add(vec![jpeg("a.jpg", 1)]).accepted[0];
        list.drain_changes();

        assert!(!list.remove(ImageId(999)));
        assert_eq!(list.len(), 1);
        assert!(list.drain_changes().is_empty());

        assert!(list.remove(id));
        assert!(list.is_empty());
        assert_eq!(list.drain_changes(), vec![ListChange::Removed(id)]);
    }

    #[test]
    fn test_clear_all_on_empty_never_asks() {
        let mut list = StagingList::default();
        let mut asked = false;

        assert!(!list.clear_all(|_| {
            asked = true;
            true
        }));
        assert!(!asked);
        assert!(list.drain_changes().is_empty());
    }

    #[test]
    fn test_clear_all_requires_confirmation() {
        let mut list = StagingList::default();
        list.add(vec![jpeg("a.jpg", 1), jpeg("b.jpg", 2)]);

        assert!(!list.clear_all(|count| {
            assert_eq!(count, 2);
            false
        }));
        assert_eq!(list.len(), 2);

        assert!(list.clear_all(|_| true));
        assert!(list.is_empty());
    }

    #[test]
    fn test_export_skips_server_images() {
        let mut list = StagingList::default();
        let token = list.begin_hydration();
        list.apply_hydrated(token, fetched("servidor.jpg"));
        list.add(vec![jpeg("nueva.jpg", 10), jpeg("otra.jpg", 20)]);

        let payload = list.export_payload();
        let names: Vec<_> = payload.files().iter().map(|f| f.name.as_str()).collect();

        assert_eq!(list.len(), 3);
        assert_eq!(names, ["nueva.jpg", "otra.jpg"]);
    }

    #[test]
    fn test_stale_token_is_dropped() {
        let mut list = StagingList::default();
        let first = list.begin_hydration();
        let second = list.begin_hydration();

        assert!(!list.apply_hydrated(first, fetched("vieja.jpg")));
        assert!(list.apply_hydrated(second, fetched("nueva.jpg")));
        assert_eq!(list.len(), 1);
        assert_eq!(list.images()[0].name, "nueva.jpg");
    }

    #[test]
    fn test_server_names_are_unique() {
        let mut list = StagingList::default();
        let token = list.begin_hydration();

        assert!(list.apply_hydrated(token, fetched("a.jpg")));
        assert!(!list.apply_hydrated(token, fetched("a.jpg")));
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_hydrate_empty_names_only_clears() {
        let mut list = StagingList::default();
        list.add(vec![jpeg("local.jpg", 1)]);

        let summary = list.hydrate(&FakeFetcher::default(), &request(" , ,")).await;

        assert!(list.is_empty());
        assert_eq!(summary, HydrationSummary::default());
    }

    #[tokio::test]
    async fn test_hydrate_partial_failure() {
        let fetcher = FakeFetcher::default()
            .status(A, 404)
            .ok(B, "image/jpeg", 0);
        let mut list = StagingList::default();
        list.add(vec![jpeg("local.jpg", 1)]);

        let summary = list.hydrate(&fetcher, &request("a.jpg,b.jpg")).await;

        assert_eq!(summary, HydrationSummary { loaded: 1, failed: 1 });
        assert_eq!(list.len(), 1);
        assert_eq!(list.images()[0].name, "b.jpg");
        assert!(!list.images()[0].is_local());
        assert!(list.images()[0].preview.is_some());
    }

    #[tokio::test]
    async fn test_hydrate_rejects_non_image_body() {
        let fetcher = FakeFetcher::default()
            .ok(A, "text/html; charset=utf-8", 0)
            .ok(B, "image/png", 0);
        let mut list = StagingList::default();

        let summary = list.hydrate(&fetcher, &request("a.jpg,b.jpg")).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(list.images()[0].name, "b.jpg");
    }

    #[tokio::test]
    async fn test_hydrate_appends_in_completion_order() {
        let fetcher = FakeFetcher::default()
            .ok(A, "image/jpeg", 80)
            .ok(B, "image/jpeg", 0);
        let mut list = StagingList::default();

        let summary = list.hydrate(&fetcher, &request("a.jpg,b.jpg")).await;

        assert_eq!(summary.loaded, 2);
        let names: Vec<_> = list.images().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["b.jpg", "a.jpg"]);
    }
}
