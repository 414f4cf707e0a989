/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Display format for history and series labels (local time).
pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a receive timestamp as a local-time display label.
pub fn format_label(at: Timestamp) -> String {
    at.with_timezone(&chrono::Local)
        .format(LABEL_FORMAT)
        .to_string()
}
