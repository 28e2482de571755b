//! The five soft-404 probe URL generators.

use url::Url;

use super::key::{authority, directory_of, parent_of};

/// Number of distinct probe generators (`signatures` has one slot per
/// generator, regardless of `precision`).
pub const GENERATOR_COUNT: usize = 5;

/// One probe request to be issued while fingerprinting a directory.
pub struct Probe {
    /// Index into `DirectoryRecord::signatures` this probe's response
    /// contributes to.
    pub generator: usize,
    pub url: Url,
}

/// Builds `GENERATOR_COUNT * precision` probe URLs for `url`'s
/// directory: each of the five generators is invoked `precision` times
/// with a fresh random token per invocation.
pub fn generate_probes(url: &Url, precision: usize) -> Vec<Probe> {
    let dir = directory_of(url);
    let parent = parent_of(&dir);
    let base = format!("{}://{}", url.scheme(), authority(url));

    let mut probes = Vec::with_capacity(GENERATOR_COUNT * precision);
    for generator in 0..GENERATOR_COUNT {
        for _ in 0..precision {
            let path = build_path(generator, &dir, &parent, precision);
            if let Ok(probe_url) = Url::parse(&format!("{base}{path}")) {
                probes.push(Probe { generator, url: probe_url });
            }
        }
    }
    probes
}

fn build_path(generator: usize, dir: &str, parent: &str, precision: usize) -> String {
    let token = random_token();
    match generator {
        0 => format!("{dir}{token}.{}", &random_token()[..precision.min(random_token_len())]),
        1 => format!("{dir}{token}"),
        2 => format!("{parent}{token}"),
        3 => format!("{parent}{token}.{}", &random_token()[..precision.min(random_token_len())]),
        4 => format!("{dir}{token}/"),
        _ => unreachable!("GENERATOR_COUNT is 5"),
    }
}

const fn random_token_len() -> usize {
    16
}

/// A fresh opaque hex token, used as the random path segment in every
/// probe URL.
fn random_token() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_controls_probes_per_generator() {
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        let probes = generate_probes(&url, 2);
        assert_eq!(probes.len(), GENERATOR_COUNT * 2);
        for generator in 0..GENERATOR_COUNT {
            assert_eq!(probes.iter().filter(|p| p.generator == generator).count(), 2);
        }
    }

    #[test]
    fn probe_urls_share_the_original_scheme_and_host() {
        let url: Url = "https://h/dir/file.ext".parse().unwrap();
        let probes = generate_probes(&url, 1);
        for probe in &probes {
            assert_eq!(probe.url.scheme(), "https");
            assert_eq!(probe.url.host_str(), Some("h"));
        }
    }
}
