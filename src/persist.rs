//! JSON state files shared by the persona, memory and state components.

use crate::error::Result;
use crate::logging;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Read a JSON state file, falling back to `default` when the file is
/// missing or unreadable. A corrupt file is logged, never fatal.
pub fn load_or<T, F>(path: &Path, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        return default();
    }

    match fs::read_to_string(path)
        .map_err(crate::error::Error::from)
        .and_then(|raw| serde_json::from_str::<T>(&raw).map_err(Into::into))
    {
        Ok(value) => value,
        Err(e) => {
            logging::log_error(
                None,
                &format!("Failed to load {}: {}", path.display(), e),
            );
            default()
        }
    }
}

/// Write a JSON state file, creating the parent directory if needed.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Save and log instead of propagating; used on the reply path where a
/// failed write must not lose the reply.
pub fn save_logged<T: Serialize>(path: &Path, value: &T) {
    if let Err(e) = save(path, value) {
        logging::log_error(None, &format!("Failed to save {}: {}", path.display(), e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<u32> = load_or(&dir.path().join("nope.json"), || vec![7]);
        assert_eq!(value, vec![7]);
    }

    #[test]
    fn test_corrupt_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let value: BTreeMap<String, f64> = load_or(&path, BTreeMap::new);
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        save(&path, &vec!["حزن", "فرح"]).unwrap();
        let loaded: Vec<String> = load_or(&path, Vec::new);
        assert_eq!(loaded, vec!["حزن".to_string(), "فرح".to_string()]);
    }
}
