use chrono::{DateTime, Local};

/// One processed candidate, as written to the scrape log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub product_id: i64,
    pub barcode: String,
    pub success: bool,
    pub message: String,
}

impl LogEntry {
    pub fn new(product_id: i64, barcode: &str, success: bool, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            product_id,
            barcode: barcode.to_string(),
            success,
            message: message.to_string(),
        }
    }

    /// Render the entry as a single log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] Product ID: {}, Barcode: {}, Success: {}, Message: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.product_id,
            self.barcode,
            if self.success { "Yes" } else { "No" },
            self.message
        )
    }
}
