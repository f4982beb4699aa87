//! Data directory resolution.

use std::path::PathBuf;

/// Resolve the directory that holds all conversation files.
///
/// Precedence: the `TETHER_DATA_DIR` environment variable, then
/// `<documents>/TetherChats`, then `./TetherChats`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TETHER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(documents) = dirs::document_dir() {
        return documents.join("TetherChats");
    }

    PathBuf::from("TetherChats")
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test so the environment variable is never raced.
    #[test]
    fn test_resolution_order() {
        unsafe { std::env::remove_var("TETHER_DATA_DIR") };
        assert!(resolve_data_dir().ends_with("TetherChats"));

        unsafe { std::env::set_var("TETHER_DATA_DIR", "/tmp/tether-test") };
        assert_eq!(resolve_data_dir(), PathBuf::from("/tmp/tether-test"));
        unsafe { std::env::remove_var("TETHER_DATA_DIR") };
    }
}
