//! Directory-key derivation: the URL under which 404-fingerprint state
//! for a whole directory is stored.

use url::Url;

pub(crate) fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// The path up to and including the final `/` before the last segment.
pub(crate) fn directory_of(url: &Url) -> String {
    let path = url.path();
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => "/".to_string(),
    }
}

/// One level up from `dir` (itself already directory-shaped, trailing `/`).
pub(crate) fn parent_of(dir: &str) -> String {
    let trimmed = dir.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => format!("{parent}/"),
        _ => "/".to_string(),
    }
}

fn last_segment_has_extension(url: &Url) -> bool {
    let last = url.path().rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((name, ext)) => !name.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// Canonical key all fingerprinting state for `url`'s directory is
/// stored under: scheme + host + port + directory path, trailing `/`.
///
/// If the URL's last path segment has a file extension, the key is
/// that segment's own directory; otherwise the path already looks
/// directory-shaped, so the key is one level further up.
pub fn directory_key(url: &Url) -> String {
    let dir = directory_of(url);
    let key_path = if last_segment_has_extension(url) {
        dir
    } else {
        parent_of(&dir)
    };
    format!("{}://{}{key_path}", url.scheme(), authority(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_with_extension_keys_by_its_own_directory() {
        let url: Url = "http://h/a/b/file.ext".parse().unwrap();
        assert_eq!(directory_key(&url), "http://h/a/b/");
    }

    #[test]
    fn extensionless_path_keys_by_the_parent_directory() {
        let url: Url = "http://h/a/b/report".parse().unwrap();
        assert_eq!(directory_key(&url), "http://h/a/");
    }

    #[test]
    fn two_urls_in_the_same_directory_share_a_key() {
        let a: Url = "http://h/a/b/one.ext".parse().unwrap();
        let b: Url = "http://h/a/b/two.ext".parse().unwrap();
        assert_eq!(directory_key(&a), directory_key(&b));
    }

    #[test]
    fn port_is_part_of_the_key() {
        let a: Url = "http://h:8080/a/b.ext".parse().unwrap();
        let b: Url = "http://h/a/b.ext".parse().unwrap();
        assert_ne!(directory_key(&a), directory_key(&b));
    }
}
