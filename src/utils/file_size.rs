pub struct FileSizeUtils;

impl FileSizeUtils {
    /// `1536` -> `"1.5 KB"`. Up to two decimals, trailing zeros dropped.
    pub fn format_size(size: u64) -> String {
        const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
        if size == 0 {
            return "0 Bytes".to_string();
        }

        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        let number = format!("{:.2}", size);
        let number = number.trim_end_matches('0').trim_end_matches('.');
        format!("{} {}", number, UNITS[unit_index])
    }
}
