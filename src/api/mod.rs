mod client;
mod types;

pub use client::SeguimientoClient;
pub use types::{
    Comentario, CreateDocumentResponse, SaveResponse, SeguimientoSnapshot, UploadResponse,
};
