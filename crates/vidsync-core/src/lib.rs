pub mod config;
pub mod error;
pub mod keys;
pub mod types;

pub use error::{VidsyncError, VidsyncResult};

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// A random id that is not contained in `existing`.
pub fn generate_unique_id<S: AsRef<str>>(existing: &[S]) -> String {
    loop {
        let id = uuid::Uuid::new_v4().simple().to_string();
        if !existing.iter().any(|e| e.as_ref() == id) {
            return id;
        }
    }
}
