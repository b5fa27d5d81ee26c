use super::types::{SubmitOutcome, UploadStatus};
use crate::api::{SaveResponse, SeguimientoClient, UploadResponse};
use crate::error::Result;
use crate::form::SeguimientoForm;
use crate::session::SessionContext;
use crate::staging::ExportPayload;
use async_trait::async_trait;

/// The two writes a submit performs.
#[async_trait]
pub trait FollowUpBackend: Send + Sync {
    async fn save_form(
        &self,
        session: &SessionContext,
        form: &SeguimientoForm,
    ) -> Result<SaveResponse>;

    async fn upload_images(
        &self,
        session: &SessionContext,
        payload: &ExportPayload,
    ) -> Result<UploadResponse>;
}

#[async_trait]
impl FollowUpBackend for SeguimientoClient {
    async fn save_form(
        &self,
        session: &SessionContext,
        form: &SeguimientoForm,
    ) -> Result<SaveResponse> {
        self.save_seguimiento(session, form).await
    }

    async fn upload_images(
        &self,
        session: &SessionContext,
        payload: &ExportPayload,
    ) -> Result<UploadResponse> {
        let body = payload.multipart().await?;
        self.upload_files(session, body).await
    }
}

/// Saves one follow-up and then uploads its staged images.
pub struct SubmitProcessor {
    session: SessionContext,
    form: SeguimientoForm,
    payload: ExportPayload,
}

impl SubmitProcessor {
    pub fn new(session: SessionContext, form: SeguimientoForm, payload: ExportPayload) -> Self {
        Self {
            session,
            form,
            payload,
        }
    }

    /// A failed save is an error. A failed upload after a good save is
    /// reported inside the outcome so both results reach the user.
    pub async fn run<B>(&self, backend: &B) -> Result<SubmitOutcome>
    where
        B: FollowUpBackend + ?Sized,
    {
        tracing::info!(
            "Saving {} / {}",
            self.session.document_key(),
            self.session.step_key()
        );
        let saved = backend.save_form(&self.session, &self.form).await?;

        let images = if self.payload.is_empty() {
            tracing::info!("No images to upload");
            UploadStatus::Skipped
        } else {
            tracing::info!("Uploading {} image(s)", self.payload.len());
            match backend.upload_images(&self.session, &self.payload).await {
                Ok(response) => UploadStatus::Success(response.files.len()),
                Err(e) => {
                    tracing::error!("Image upload failed: {}", e);
                    UploadStatus::Error(e.user_message())
                }
            }
        };

        Ok(SubmitOutcome {
            next_step: saved.next_seguimiento,
            images,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::staging::LocalFile;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        fail_save: bool,
        fail_upload: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FollowUpBackend for FakeBackend {
        async fn save_form(
            &self,
            session: &SessionContext,
            _form: &SeguimientoForm,
        ) -> Result<SaveResponse> {
            self.calls.lock().unwrap().push(format!("save {}", session.step_key()));
            if self.fail_save {
                return Err(ClientError::Server {
                    status: 500,
                    message: "Error al guardar".to_string(),
                });
            }
            Ok(SaveResponse {
                next_seguimiento: Some(session.step() + 1),
            })
        }

        async fn upload_images(
            &self,
            session: &SessionContext,
            payload: &ExportPayload,
        ) -> Result<UploadResponse> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("upload {} x{}", session.step(), payload.len()));
            if self.fail_upload {
                return Err(ClientError::Server {
                    status: 413,
                    message: "Demasiado grande".to_string(),
                });
            }
            Ok(UploadResponse {
                files: payload.files().iter().map(|f| f.name.clone()).collect(),
                message: None,
            })
        }
    }

    fn payload(count: usize) -> ExportPayload {
        ExportPayload::new(
            (0..count)
                .map(|i| LocalFile {
                    path: format!("/tmp/{}.jpg", i).into(),
                    name: format!("{}.jpg", i),
                    media_type: "image/jpeg".to_string(),
                    size: 10,
                })
                .collect(),
        )
    }

    fn processor(images: usize) -> SubmitProcessor {
        SubmitProcessor::new(
            SessionContext::open("77", "1001", 8),
            SeguimientoForm::default(),
            payload(images),
        )
    }

    #[tokio::test]
    async fn test_save_then_upload() {
        let backend = FakeBackend::default();

        let outcome = processor(2).run(&backend).await.unwrap();

        assert_eq!(outcome.next_step, Some(2));
        assert_eq!(outcome.images, UploadStatus::Success(2));
        assert_eq!(
            *backend.calls.lock().unwrap(),
            ["save seguimiento_1", "upload 1 x2"]
        );
    }

    #[tokio::test]
    async fn test_no_images_skips_upload() {
        let backend = FakeBackend::default();

        let outcome = processor(0).run(&backend).await.unwrap();

        assert_eq!(outcome.images, UploadStatus::Skipped);
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_save() {
        let backend = FakeBackend {
            fail_upload: true,
            ..Default::default()
        };

        let outcome = processor(1).run(&backend).await.unwrap();

        assert_eq!(outcome.next_step, Some(2));
        assert!(matches!(outcome.images, UploadStatus::Error(ref msg) if msg.contains("Demasiado grande")));
    }

    #[tokio::test]
    async fn test_save_failure_stops_everything() {
        let backend = FakeBackend {
            fail_save: true,
            ..Default::default()
        };

        assert!(processor(3).run(&backend).await.is_err());
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }
}
