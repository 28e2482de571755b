//! File-backed persistence for a single [`CookieJar`].
//!
//! Reads and writes the whole file each time; `save_jar` writes to a
//! `.tmp` sibling and renames it into place so a reader never observes
//! a half-written file.

use std::fs;
use std::path::Path;

use crate::errors::ClientError;

use super::jar::CookieJar;

/// Loads a jar from `path`. A missing file yields an empty jar rather
/// than an error — a `Client` configured with a cookie-jar path that
/// has never been written to should start clean.
pub fn load_jar(path: &Path) -> Result<CookieJar, ClientError> {
    if !path.exists() {
        return Ok(CookieJar::new());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ClientError::CookieJarIo(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| ClientError::CookieJarIo(format!("parsing {}: {e}", path.display())))
}

/// Serializes `jar` and writes it to `path`, via a temporary sibling
/// file that is renamed into place.
pub fn save_jar(jar: &CookieJar, path: &Path) -> Result<(), ClientError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::CookieJarIo(format!("creating {}: {e}", parent.display())))?;
        }
    }

    let contents = serde_json::to_vec_pretty(jar)
        .map_err(|e| ClientError::CookieJarIo(format!("serializing cookie jar: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &contents)
        .map_err(|e| ClientError::CookieJarIo(format!("writing {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| ClientError::CookieJarIo(format!("replacing {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieSource;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let mut jar = CookieJar::new();
        jar.update([CookieSource::NameValue {
            name: "a".to_string(),
            value: "1".to_string(),
            default_domain: "h".to_string(),
        }]);

        save_jar(&jar, &path).unwrap();
        let loaded = load_jar(&path).unwrap();
        assert_eq!(loaded.len(), jar.len());
    }

    #[test]
    fn missing_file_yields_empty_jar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let jar = load_jar(&path).unwrap();
        assert!(jar.is_empty());
    }
}
