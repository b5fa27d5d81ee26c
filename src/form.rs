use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Intervention areas offered as checkboxes, `(id, label)`.
pub const DIMENSIONES: [(&str, &str); 9] = [
    ("identificacion", "Identificación"),
    ("ingresos", "Ingresos y trabajo"),
    ("educacion", "Educación y capacitación"),
    ("salud", "Salud"),
    ("nutricion", "Nutrición"),
    ("habitabilidad", "Habitabilidad"),
    ("dinamica_familiar", "Dinámica familiar"),
    ("bancarizacion", "Bancarización y ahorro"),
    ("justicia", "Acceso a la justicia"),
];

pub fn dimension_label(id: &str) -> &str {
    DIMENSIONES
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, label)| *label)
        .unwrap_or(id)
}

/// Treats `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compromiso {
    #[serde(deserialize_with = "null_as_default")]
    pub descripcion: String,
    #[serde(alias = "fecha", deserialize_with = "null_as_default")]
    pub fecha_cumplimiento: String,
    #[serde(deserialize_with = "null_as_default")]
    pub responsable: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Participante {
    #[serde(deserialize_with = "null_as_default")]
    pub nombre: String,
    #[serde(deserialize_with = "null_as_default")]
    pub rol: String,
}

/// Everything the adviser fills in for one follow-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeguimientoForm {
    #[serde(deserialize_with = "null_as_default")]
    pub dimensiones: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub fecha: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hora: String,
    #[serde(deserialize_with = "null_as_default")]
    pub objetivo: String,
    #[serde(alias = "aspectos_abordados", deserialize_with = "null_as_default")]
    pub aspectos: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avances: String,
    #[serde(deserialize_with = "null_as_default")]
    pub retos: String,
    #[serde(deserialize_with = "null_as_default")]
    pub oportunidades: String,
    #[serde(deserialize_with = "null_as_default")]
    pub compromisos: Vec<Compromiso>,
    #[serde(deserialize_with = "null_as_default")]
    pub participantes: Vec<Participante>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Dimensiones,
    Fecha,
    Hora,
    Objetivo,
    CompromisoFecha(usize),
    CompromisoResponsable(usize),
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormField::Dimensiones => write!(f, "Dimensiones a intervenir"),
            FormField::Fecha => write!(f, "Fecha"),
            FormField::Hora => write!(f, "Hora"),
            FormField::Objetivo => write!(f, "Objetivo"),
            FormField::CompromisoFecha(i) => write!(f, "Fecha del compromiso {}", i + 1),
            FormField::CompromisoResponsable(i) => {
                write!(f, "Responsable del compromiso {}", i + 1)
            }
        }
    }
}

impl SeguimientoForm {
    pub fn has_dimension(&self, id: &str) -> bool {
        self.dimensiones.iter().any(|d| d == id)
    }

    pub fn set_dimension(&mut self, id: &str, checked: bool) {
        if checked {
            if !self.has_dimension(id) {
                self.dimensiones.push(id.to_string());
            }
        } else {
            self.dimensiones.retain(|d| d != id);
        }
    }

    /// Every required field left blank, in form order.
    pub fn missing_fields(&self) -> Vec<FormField> {
        let blank = |s: &str| s.trim().is_empty();
        let mut missing = Vec::new();

        if self.dimensiones.is_empty() {
            missing.push(FormField::Dimensiones);
        }
        if blank(&self.fecha) {
            missing.push(FormField::Fecha);
        }
        if blank(&self.hora) {
            missing.push(FormField::Hora);
        }
        if blank(&self.objetivo) {
            missing.push(FormField::Objetivo);
        }
        for (i, compromiso) in self.compromisos.iter().enumerate() {
            if blank(&compromiso.fecha_cumplimiento) {
                missing.push(FormField::CompromisoFecha(i));
            }
            if blank(&compromiso.responsable) {
                missing.push(FormField::CompromisoResponsable(i));
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}
