use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },

    #[error("{name} is not a valid image (content type: {content_type})")]
    NotAnImage { name: String, content_type: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl ClientError {
    /// Text shown in dialogs. Server errors carry their own wording.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Http(e) if e.is_timeout() => {
                "El servidor tardó demasiado en responder".to_string()
            }
            ClientError::Http(e) if e.is_connect() => {
                "No se pudo conectar con el servidor".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
