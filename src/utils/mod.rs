//! Shared utilities

pub mod command;

use std::path::{Path, PathBuf};

/// Expand a leading tilde (~) to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/backups"));
        assert!(!expanded.starts_with("~"));
    }

    #[test]
    fn test_expand_tilde_absolute_unchanged() {
        let path = Path::new("/var/backups");
        assert_eq!(expand_tilde(path), PathBuf::from("/var/backups"));
    }
}
