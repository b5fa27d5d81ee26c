use super::types::{
    CreateDocumentRequest, CreateDocumentResponse, ErrorBody, SaveResponse, SeguimientoSnapshot,
    UploadResponse,
};
use crate::config::AppConfig;
use crate::error::{ClientError, Result};
use crate::form::SeguimientoForm;
use crate::session::SessionContext;
use crate::staging::{ImageFetcher, RawImage};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/seguimientos/login";
pub const LOGOUT_PATH: &str = "/seguimientos/logout";
pub const CREATE_DOCUMENT_PATH: &str = "/create-document";

pub fn snapshot_path(session: &SessionContext) -> String {
    format!(
        "/get-seguimiento/{}/{}",
        session.document_key(),
        session.step_key()
    )
}

pub fn save_path(session: &SessionContext) -> String {
    format!(
        "/save-seguimiento/{}/{}",
        session.document_key(),
        session.step_key()
    )
}

pub fn upload_path(session: &SessionContext) -> String {
    format!("/upload-file/{}/{}", session.upload_key(), session.step())
}

pub fn comment_path(session: &SessionContext) -> String {
    format!("/add-comment/{}/{}", session.upload_key(), session.step())
}

/// HTTP access to the follow-up server. Keeps the login cookies.
#[derive(Clone)]
pub struct SeguimientoClient {
    http: reqwest::Client,
    base_url: String,
}

impl SeguimientoClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        tracing::info!("Logging in as {}", username);
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(ErrorBody::into_message)
            {
                Some(message) => message,
                None if text.trim().is_empty() => "Error en la autenticación".to_string(),
                None => text,
            };
            return Err(ClientError::Server { status, message });
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        let response = self.http.post(self.url(LOGOUT_PATH)).send().await?;
        check_status(response, "Error al cerrar sesión").await?;
        Ok(())
    }

    /// The server answers with `success: false` and a `detail` on most
    /// failures, so those come back as `Ok`.
    pub async fn create_document(
        &self,
        doc_number: &str,
        apellido: &str,
    ) -> Result<CreateDocumentResponse> {
        let request = CreateDocumentRequest {
            doc_number: doc_number.trim().to_string(),
            apellido: apellido.trim().to_string(),
        };
        tracing::info!("Creating document {}", request.doc_number);

        let response = self
            .http
            .post(self.url(CREATE_DOCUMENT_PATH))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<CreateDocumentResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ClientError::Server {
                status: status.as_u16(),
                message: "Hubo un error al crear la familia".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_seguimiento(&self, session: &SessionContext) -> Result<SeguimientoSnapshot> {
        let path = snapshot_path(session);
        tracing::debug!("GET {}", path);
        let response = self.http.get(self.url(&path)).send().await?;
        let message = format!("Error al cargar el seguimiento {}", session.step());
        json_body(check_status(response, &message).await?).await
    }

    pub async fn save_seguimiento(
        &self,
        session: &SessionContext,
        form: &SeguimientoForm,
    ) -> Result<SaveResponse> {
        let path = save_path(session);
        tracing::debug!("POST {}", path);
        let response = self.http.post(self.url(&path)).json(form).send().await?;
        json_body(check_status(response, "Error al guardar los datos del seguimiento").await?).await
    }

    /// The server answers with a redirect back to the document page.
    pub async fn add_comment(&self, session: &SessionContext, text: &str) -> Result<()> {
        let path = comment_path(session);
        tracing::debug!("POST {}", path);
        let response = self
            .http
            .post(self.url(&path))
            .form(&[("comentario", text)])
            .send()
            .await?;
        if response.status().is_redirection() {
            return Ok(());
        }
        check_status(response, "Error al agregar el comentario").await?;
        Ok(())
    }

    pub async fn upload_files(&self, session: &SessionContext, body: Form) -> Result<UploadResponse> {
        let path = upload_path(session);
        tracing::debug!("POST {} (multipart)", path);
        let response = self.http.post(self.url(&path)).multipart(body).send().await?;
        json_body(check_status(response, "Error al subir las imágenes").await?).await
    }
}

#[async_trait]
impl ImageFetcher for SeguimientoClient {
    async fn fetch_image(&self, path: &str) -> Result<RawImage> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = check_status(response, "Error al cargar imagen").await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?;
        Ok(RawImage {
            content_type,
            bytes: Arc::from(bytes.to_vec()),
        })
    }
}

/// Passes successful responses through; otherwise builds a `Server` error
/// from the body's `detail`/`message`, falling back to `fallback`.
async fn check_status(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| fallback.to_string());
    tracing::warn!("Request failed with {}: {}", status, message);

    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Empty bodies decode as the type's default.
async fn json_body<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_session() {
        let mut session = SessionContext::open("1001456000", "1001", 8);
        session.advance_to(4);

        assert_eq!(
            snapshot_path(&session),
            "/get-seguimiento/documento_1001456000_1001/seguimiento_4"
        );
        assert_eq!(
            save_path(&session),
            "/save-seguimiento/documento_1001456000_1001/seguimiento_4"
        );
        assert_eq!(upload_path(&session), "/upload-file/1001456000_1001/4");
        assert_eq!(comment_path(&session), "/add-comment/1001456000_1001/4");
    }

    #[test]
    fn test_url_joins_base() {
        let config = AppConfig::default().with_base_url("http://casos.local:8000/");
        let client = SeguimientoClient::new(&config).unwrap();

        assert_eq!(
            client.url(LOGIN_PATH),
            "http://casos.local:8000/seguimientos/login"
        );
    }
}
