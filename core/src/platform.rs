//! Platform descriptors (`os/architecture/variant`).
//!
//! Parsing accepts the forms users type on the command line (`amd64`,
//! `linux/arm64`, `linux/arm/v7`, `aarch64`) and normalizes them to the
//! names used in OCI image indexes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// Operating systems recognised when a single-component platform is parsed.
const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux",
    "netbsd", "openbsd", "plan9", "solaris", "windows",
];

/// A build target as it appears in an image index.
///
/// Derived `PartialEq` is strict structural equality. Selection uses
/// [`Platform::matches`], which treats a missing variant as a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, architecture: &str, variant: Option<&str>) -> Self {
        let os = os.to_ascii_lowercase();
        let (architecture, variant) = normalize_arch(
            &architecture.to_ascii_lowercase(),
            variant.map(|v| v.to_ascii_lowercase()),
        );
        Self {
            os,
            architecture,
            variant,
        }
    }

    /// The platform images are selected for by default.
    ///
    /// Containers always run on Linux, so the OS is fixed and only the
    /// architecture follows the host.
    pub fn host() -> Self {
        Self::new("linux", std::env::consts::ARCH, None)
    }

    /// Relaxed equality used for platform selection.
    ///
    /// OS and architecture must match exactly; the variant only has to match
    /// when both sides specify one.
    pub fn matches(&self, other: &Platform) -> bool {
        if self.os != other.os || self.architecture != other.architecture {
            return false;
        }
        match (&self.variant, &other.variant) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SelectionError::InvalidPlatform(s.to_string());
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [single] => {
                let lower = single.to_ascii_lowercase();
                if KNOWN_OS.contains(&lower.as_str()) {
                    Ok(Self::new(&lower, std::env::consts::ARCH, None))
                } else if is_known_arch(&lower) {
                    Ok(Self::new("linux", &lower, None))
                } else {
                    Err(invalid())
                }
            }
            [os, arch] => Ok(Self::new(os, arch, None)),
            [os, arch, variant] => Ok(Self::new(os, arch, Some(variant))),
            _ => Err(invalid()),
        }
    }
}

/// Parse a list of platform strings, each possibly comma-separated.
pub fn parse_platforms<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Platform>, SelectionError> {
    specs
        .iter()
        .flat_map(|spec| spec.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Platform::from_str)
        .collect()
}

fn is_known_arch(arch: &str) -> bool {
    matches!(
        arch,
        "386" | "i386" | "amd64" | "x86_64" | "x86-64" | "arm" | "armhf" | "armel" | "arm64"
            | "aarch64" | "ppc64" | "ppc64le" | "mips" | "mipsle" | "mips64" | "mips64le"
            | "riscv64" | "s390x" | "loong64" | "wasm"
    )
}

fn normalize_arch(arch: &str, variant: Option<String>) -> (String, Option<String>) {
    let variant = variant.map(|v| {
        if v.chars().all(|c| c.is_ascii_digit()) {
            format!("v{v}")
        } else {
            v
        }
    });

    match arch {
        "i386" | "x86" => ("386".to_string(), None),
        "x86_64" | "x86-64" => ("amd64".to_string(), None),
        "aarch64" => ("arm64".to_string(), variant),
        "armhf" => ("arm".to_string(), Some("v7".to_string())),
        "armel" => ("arm".to_string(), Some("v6".to_string())),
        other => (other.to_string(), variant),
    }
}
