use std::env;
use std::path::PathBuf;

/// Name of the per-user data directory
pub const CAMPUS_DIR_NAME: &str = ".campus";

/// Get the path to the Campus directory (~/.campus)
///
/// Falls back to the current directory when no home directory can be found,
/// so callers never have to handle a missing home.
pub fn campus_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home).join(CAMPUS_DIR_NAME);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CAMPUS_DIR_NAME)
}

/// Get the path of the durable store directory (~/.campus/storage)
pub fn durable_store_dir() -> PathBuf {
    campus_dir().join("storage")
}
