//! Platform selection against an image index.

use a3s_stow_core::error::SelectionError;
use a3s_stow_core::image::ManifestEntry;
use a3s_stow_core::platform::Platform;

/// Which manifests of an index to export.
///
/// - `all`: every entry, in index order, `requested` is ignored.
/// - `requested` non-empty: the first entry matching each requested
///   platform, in request order. Unmatched requests are dropped unless none
///   match at all.
/// - otherwise: the first entry matching `host`.
///
/// Matching follows [`Platform::matches`], so a missing variant on either
/// side matches any variant. An empty `available` selects nothing; the
/// caller exports the image's single manifest as-is.
pub fn select_platforms(
    requested: &[Platform],
    all: bool,
    host: &Platform,
    available: &[ManifestEntry],
) -> Result<Vec<ManifestEntry>, SelectionError> {
    if all || available.is_empty() {
        return Ok(available.to_vec());
    }

    if requested.is_empty() {
        return find_match(host, available)
            .map(|entry| vec![entry.clone()])
            .ok_or_else(|| SelectionError::HostPlatformNotFound {
                host: host.to_string(),
                available: describe(available),
            });
    }

    let mut selected: Vec<ManifestEntry> = Vec::with_capacity(requested.len());
    for platform in requested {
        match find_match(platform, available) {
            Some(entry) => {
                if !selected
                    .iter()
                    .any(|s| s.descriptor.digest == entry.descriptor.digest)
                {
                    selected.push(entry.clone());
                }
            }
            None => tracing::debug!(platform = %platform, "Requested platform not in index"),
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::NoMatchingPlatform {
            requested: requested
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            available: describe(available),
        });
    }
    Ok(selected)
}

fn find_match<'a>(platform: &Platform, available: &'a [ManifestEntry]) -> Option<&'a ManifestEntry> {
    available
        .iter()
        .find(|entry| entry.platform.as_ref().is_some_and(|p| p.matches(platform)))
}

fn describe(available: &[ManifestEntry]) -> String {
    let platforms: Vec<String> = available
        .iter()
        .filter_map(|entry| entry.platform.as_ref().map(ToString::to_string))
        .collect();
    if platforms.is_empty() {
        "none".to_string()
    } else {
        platforms.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_stow_core::image::{BlobDescriptor, MEDIA_TYPE_OCI_MANIFEST};

    fn entry(digit: char, platform: Option<&str>) -> ManifestEntry {
        ManifestEntry {
            descriptor: BlobDescriptor::new(
                MEDIA_TYPE_OCI_MANIFEST,
                format!("sha256:{}", digit.to_string().repeat(64)),
                100,
            ),
            platform: platform.map(|p| p.parse().unwrap()),
        }
    }

    fn platforms(specs: &[&str]) -> Vec<Platform> {
        specs.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn index() -> Vec<ManifestEntry> {
        vec![
            entry('1', Some("linux/amd64")),
            entry('2', Some("linux/arm64/v8")),
            entry('3', Some("linux/arm/v7")),
            entry('4', None),
        ]
    }

    fn digits(selected: &[ManifestEntry]) -> Vec<char> {
        selected
            .iter()
            .map(|e| e.descriptor.digest.chars().last().unwrap())
            .collect()
    }

    #[test]
    fn test_default_selects_host() {
        let host: Platform = "linux/arm64".parse().unwrap();
        let selected = select_platforms(&[], false, &host, &index()).unwrap();
        assert_eq!(digits(&selected), vec!['2']);
    }

    #[test]
    fn test_default_host_missing() {
        let host: Platform = "linux/s390x".parse().unwrap();
        let err = select_platforms(&[], false, &host, &index()).unwrap_err();
        match err {
            SelectionError::HostPlatformNotFound { host, available } => {
                assert_eq!(host, "linux/s390x");
                assert_eq!(available, "linux/amd64, linux/arm64/v8, linux/arm/v7");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_all_platforms_ignores_request() {
        let host = Platform::host();
        let requested = platforms(&["linux/s390x"]);
        let selected = select_platforms(&requested, true, &host, &index()).unwrap();
        assert_eq!(selected, index());
    }

    #[test]
    fn test_requested_order_is_preserved() {
        let host = Platform::host();
        let available = index();

        let forward = platforms(&["linux/amd64", "linux/arm64"]);
        let selected = select_platforms(&forward, false, &host, &available).unwrap();
        assert_eq!(digits(&selected), vec!['1', '2']);

        let reversed = platforms(&["linux/arm64", "linux/amd64"]);
        let selected = select_platforms(&reversed, false, &host, &available).unwrap();
        assert_eq!(digits(&selected), vec!['2', '1']);
    }

    #[test]
    fn test_unmatched_requests_are_dropped() {
        let requested = platforms(&["linux/s390x", "linux/arm/v7"]);
        let selected = select_platforms(&requested, false, &Platform::host(), &index()).unwrap();
        assert_eq!(digits(&selected), vec!['3']);
    }

    #[test]
    fn test_no_request_matches() {
        let requested = platforms(&["linux/s390x", "windows/amd64"]);
        let err = select_platforms(&requested, false, &Platform::host(), &index()).unwrap_err();
        assert!(matches!(err, SelectionError::NoMatchingPlatform { .. }));
        assert!(err.to_string().contains("linux/s390x"));
    }

    #[test]
    fn test_variant_is_advisory() {
        let requested = platforms(&["linux/arm64"]);
        let selected = select_platforms(&requested, false, &Platform::host(), &index()).unwrap();
        assert_eq!(digits(&selected), vec!['2']);

        let requested = platforms(&["linux/arm/v6"]);
        assert!(select_platforms(&requested, false, &Platform::host(), &index()).is_err());
    }

    #[test]
    fn test_one_entry_per_platform() {
        let available = vec![
            entry('1', Some("linux/amd64")),
            entry('2', Some("linux/amd64")),
        ];
        let requested = platforms(&["linux/amd64", "linux/amd64"]);
        let selected = select_platforms(&requested, false, &Platform::host(), &available).unwrap();
        assert_eq!(digits(&selected), vec!['1']);
    }

    #[test]
    fn test_empty_index_selects_nothing() {
        let requested = platforms(&["linux/s390x"]);
        let selected = select_platforms(&requested, false, &Platform::host(), &[]).unwrap();
        assert!(selected.is_empty());
    }
}
