//! Bootstrap helpers for petlife.
//!
//! Env files are loaded before the TOML config is read, so they can point
//! `PETLIFE_CONFIG_PATH` somewhere else.
//!
//! File: `~/.petlife/.env` (standard dotenvy format)

use std::path::{Path, PathBuf};

use crate::settings::petlife_home;

/// Path to the petlife-specific `.env` file: `~/.petlife/.env`.
pub fn petlife_env_path() -> PathBuf {
    petlife_home().join(".env")
}

/// Load `./.env`, then `~/.petlife/.env`.
///
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.petlife/.env`
pub fn load_petlife_env() {
    let _ = dotenvy::dotenv();
    load_env_file(&petlife_env_path());
}

/// Load one env file if it exists. Returns whether anything was loaded.
pub fn load_env_file(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to load {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_petlife_env_path() {
        let path = petlife_env_path();
        assert!(path.ends_with(".petlife/.env"));
    }

    #[test]
    fn test_load_env_file_does_not_override_existing_vars() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        std::fs::write(
            &env_path,
            "PETLIFE_BOOTSTRAP_TEST_NEW=\"from-file\"\nPETLIFE_BOOTSTRAP_TEST_SET=\"from-file\"\n",
        )
        .unwrap();

        // SAFETY: these keys are unique to this test.
        unsafe { std::env::set_var("PETLIFE_BOOTSTRAP_TEST_SET", "explicit") };

        assert!(load_env_file(&env_path));
        assert_eq!(
            std::env::var("PETLIFE_BOOTSTRAP_TEST_NEW").unwrap(),
            "from-file"
        );
        assert_eq!(
            std::env::var("PETLIFE_BOOTSTRAP_TEST_SET").unwrap(),
            "explicit"
        );
    }

    #[test]
    fn test_load_env_file_missing() {
        let dir = tempdir().unwrap();
        assert!(!load_env_file(&dir.path().join("absent.env")));
    }
}
