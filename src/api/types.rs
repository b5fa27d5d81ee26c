use crate::form::{null_as_default, SeguimientoForm};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Comentario {
    #[serde(alias = "usuario", deserialize_with = "null_as_default")]
    pub autor: String,
    #[serde(alias = "comentario", deserialize_with = "null_as_default")]
    pub contenido: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fecha: String,
}

/// What `GET /get-seguimiento` returns: the form plus stored images and
/// comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SeguimientoSnapshot {
    #[serde(flatten)]
    pub form: SeguimientoForm,
    #[serde(default, deserialize_with = "image_names")]
    pub imagenes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comentarios: Vec<Comentario>,
}

impl SeguimientoSnapshot {
    pub fn image_names_csv(&self) -> String {
        self.imagenes.join(",")
    }
}

/// The server stores image names either as a list or as one comma
/// separated string.
fn image_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Names>::deserialize(deserializer)? {
        Some(Names::List(list)) => list,
        Some(Names::Csv(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub next_seguimiento: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateDocumentRequest {
    pub doc_number: String,
    pub apellido: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateDocumentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Error bodies look like `{"detail": ...}` or `{"message": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or_else(|| {
            self.detail.map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_with_list_of_images() {
        let json = r#"{
            "numero": "2",
            "imagenes": ["a.jpg", "b.png"],
            "dimensiones": ["salud", "educacion"],
            "fecha": "2025-02-01",
            "hora": "10:00",
            "objetivo": "Visita",
            "aspectos": "",
            "avances": "Bien",
            "retos": "",
            "oportunidades": "",
            "compromisos": [],
            "participantes": [{"nombre": "Luz", "rol": "Madre"}],
            "comentarios": [{"fecha": "2025-02-02", "usuario": "1001", "comentario": "ok"}]
        }"#;

        let snapshot: SeguimientoSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.image_names_csv(), "a.jpg,b.png");
        assert_eq!(snapshot.form.dimensiones.len(), 2);
        assert_eq!(snapshot.form.participantes[0].rol, "Madre");
        assert_eq!(snapshot.comentarios[0].autor, "1001");
    }

    #[test]
    fn test_snapshot_with_csv_images_and_gaps() {
        let snapshot: SeguimientoSnapshot =
            serde_json::from_str(r#"{"imagenes": "a.jpg, b.jpg,", "objetivo": null}"#).unwrap();

        assert_eq!(snapshot.imagenes, ["a.jpg", "b.jpg"]);
        assert_eq!(snapshot.form.objetivo, "");

        let empty: SeguimientoSnapshot = serde_json::from_str("{}").unwrap();
        assert!(empty.imagenes.is_empty());
        assert_eq!(empty.image_names_csv(), "");
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "El documento ya existe"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("El documento ya existe"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"loc": ["body"]}]}"#).unwrap();
        assert!(body.into_message().unwrap().contains("loc"));
    }

    #[test]
    fn test_create_document_error_shape() {
        let response: CreateDocumentResponse =
            serde_json::from_str(r#"{"detail": "Usuario no autenticado"}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.detail.as_deref(), Some("Usuario no autenticado"));
    }
}
