use eframe::egui::Color32;

pub trait ColorExt {
    fn from_hex(hex: &str) -> Option<Self>
    where
        Self: Sized;

    /// Like `from_hex`, with a fallback for malformed input
    fn hex_or(hex: &str, fallback: Self) -> Self
    where
        Self: Sized,
    {
        Self::from_hex(hex).unwrap_or(fallback)
    }
}

impl ColorExt for Color32 {
    fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

        Some(Color32::from_rgb(r, g, b))
    }
}

/// Form colors
pub mod palette {
    use super::ColorExt;
    use eframe::egui::Color32;

    pub fn error() -> Color32 {
        Color32::hex_or("#ef4444", Color32::RED)
    }

    pub fn success() -> Color32 {
        Color32::hex_or("#16a34a", Color32::GREEN)
    }

    pub fn accent() -> Color32 {
        Color32::hex_or("#3085d6", Color32::LIGHT_BLUE)
    }

    pub fn danger() -> Color32 {
        Color32::hex_or("#d33333", Color32::DARK_RED)
    }

    pub fn muted() -> Color32 {
        Color32::hex_or("#94a3b8", Color32::GRAY)
    }
}
