use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Body and declared content type of a fetched image.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// GETs `path` relative to the server root. Non-success statuses are
    /// errors.
    async fn fetch_image(&self, path: &str) -> Result<RawImage>;
}

/// Which stored images to load for one follow-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationRequest {
    pub container_id: String,
    pub tracking_id: String,
    /// Comma separated, as the server stores it
    pub names: String,
    pub endpoint: String,
}

impl HydrationRequest {
    pub fn new(
        container_id: impl Into<String>,
        tracking_id: impl Into<String>,
        names: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            tracking_id: tracking_id.into(),
            names: names.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn image_path(&self, name: &str) -> String {
        format!(
            "/seguimientos{}/{}/{}/{}",
            self.endpoint,
            utf8_percent_encode(&self.container_id, SEGMENT),
            utf8_percent_encode(&self.tracking_id, SEGMENT),
            utf8_percent_encode(name, SEGMENT)
        )
    }
}

type PendingFetch<'a> = BoxFuture<'a, (String, Result<FetchedImage>)>;

/// One future per name, yielding in completion order. A failed item never
/// affects its siblings.
pub fn fetch_all<'a, F>(
    fetcher: &'a F,
    request: &'a HydrationRequest,
) -> FuturesUnordered<PendingFetch<'a>>
where
    F: ImageFetcher + ?Sized,
{
    request
        .names()
        .into_iter()
        .map(|name| {
            let name = name.to_string();
            let path = request.image_path(&name);
            async move {
                tracing::debug!("GET {}", path);
                let result = fetcher
                    .fetch_image(&path)
                    .await
                    .and_then(|raw| into_image(name.clone(), raw));
                (name, result)
            }
            .boxed()
        })
        .collect()
}

/// Drives every fetch of `request` to completion and hands each image to
/// `on_image` as it lands. Failures are logged and counted; the count is
/// returned once all fetches settled.
pub async fn stream_images<F, C>(fetcher: &F, request: &HydrationRequest, mut on_image: C) -> usize
where
    F: ImageFetcher + ?Sized,
    C: FnMut(FetchedImage),
{
    let mut failed = 0;
    let mut pending = fetch_all(fetcher, request);
    while let Some((name, result)) = pending.next().await {
        match result {
            Ok(image) => on_image(image),
            Err(e) => {
                tracing::warn!("Could not load image {}: {}", name, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        tracing::warn!("{} image(s) could not be loaded", failed);
    }
    failed
}

fn into_image(name: String, raw: RawImage) -> Result<FetchedImage> {
    if !raw.content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(ClientError::NotAnImage {
            name,
            content_type: raw.content_type,
        });
    }
    Ok(FetchedImage {
        name,
        content_type: raw.content_type,
        bytes: raw.bytes,
    })
}
