use super::types::{LocalFile, Preview};
use crate::error::Result;
use reqwest::multipart::{Form, Part};

/// Multipart field every staged file is sent under.
pub const UPLOAD_FIELD: &str = "files";

#[derive(Debug, Clone, Default)]
pub struct ExportPayload {
    files: Vec<LocalFile>,
}

impl ExportPayload {
    pub fn new(files: Vec<LocalFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[LocalFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Reads every file and builds the upload body, one part per file.
    pub async fn multipart(&self) -> Result<Form> {
        let mut form = Form::new();
        for file in &self.files {
            let bytes = tokio::fs::read(&file.path).await?;
            tracing::debug!("Adding {} ({} bytes) to upload", file.name, bytes.len());
            let part = Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(&file.media_type)?;
            form = form.part(UPLOAD_FIELD, part);
        }
        Ok(form)
    }
}

/// Reads a picked file so it can be shown before upload.
pub async fn load_preview(file: &LocalFile) -> Result<Preview> {
    let bytes = tokio::fs::read(&file.path).await?;
    Ok(Preview::new(file.media_type.clone(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(dir: &std::path::Path, name: &str, content: &[u8]) -> LocalFile {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        LocalFile {
            path,
            name: name.to_string(),
            media_type: "image/png".to_string(),
            size: content.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_multipart_boundary_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let payload = ExportPayload::new(vec![
            local(dir.path(), "uno.png", b"one"),
            local(dir.path(), "dos.png", b"two"),
        ]);

        let form = payload.multipart().await.unwrap();
        assert!(!form.boundary().is_empty());
        assert_eq!(payload.len(), 2);

        let preview = load_preview(&payload.files()[1]).await.unwrap();
        assert_eq!(&*preview.bytes, b"two");
        assert_eq!(preview.media_type, "image/png");
    }

    /// Accepts one request and returns its raw bytes as text.
    async fn capture_request(listener: tokio::net::TcpListener, end_marker: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            if String::from_utf8_lossy(&received).contains(&end_marker) {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}")
            .await
            .unwrap();
        String::from_utf8_lossy(&received).into_owned()
    }

    #[tokio::test]
    async fn test_multipart_sends_one_files_part_per_image_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut jpeg = local(dir.path(), "sala.jpg", b"jpeg-bytes");
        jpeg.media_type = "image/jpeg".to_string();
        let payload = ExportPayload::new(vec![
            local(dir.path(), "patio.png", b"png-bytes"),
            jpeg,
            local(dir.path(), "cocina.png", b"more-png"),
        ]);

        let form = payload.multipart().await.unwrap();
        let end_marker = format!("--{}--", form.boundary());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_request(listener, end_marker));

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client
            .post(format!("http://{}/upload-file/77_1001/1", addr))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let request = server.await.unwrap();
        assert_eq!(request.matches("name=\"files\"").count(), 3);

        let positions: Vec<usize> = ["patio.png", "sala.jpg", "cocina.png"]
            .iter()
            .map(|name| {
                request
                    .find(&format!("name=\"files\"; filename=\"{}\"", name))
                    .unwrap_or_else(|| panic!("no part for {}", name))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(request.contains("image/jpeg"));
        assert!(request.contains("jpeg-bytes"));
        assert!(request.contains("more-png"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_the_body() {
        let payload = ExportPayload::new(vec![LocalFile {
            path: "/no/existe/foto.png".into(),
            name: "foto.png".to_string(),
            media_type: "image/png".to_string(),
            size: 1,
        }]);

        assert!(payload.multipart().await.is_err());
    }
}
