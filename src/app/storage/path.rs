//! Cache file path generation
//!
//! Layout:
//! - Packages and their signatures: `{root}/{repository}/{architecture}/{name}/{version}/{file}`
//! - Everything else: `{root}/{repository}/{architecture}/{file}`
//!
//! Partial downloads sit next to their full file with a `.partial` suffix.

use std::path::{Path, PathBuf};

use crate::app::models::{ResourceId, ResourceKind};
use crate::constants::PARTIAL_SUFFIX;

/// Path generation utility for cache files
pub struct PathGenerator;

impl PathGenerator {
    /// Location of the complete file
    pub fn full_path(root: &Path, id: &ResourceId, kind: ResourceKind) -> PathBuf {
        let mut path = root.to_path_buf();
        path.push(&id.repository);
        path.push(&id.architecture);

        if matches!(kind, ResourceKind::Package | ResourceKind::Signature) {
            if let Some(package) = id.package() {
                path.push(&package.name);
                path.push(&package.version);
            }
        }

        path.push(&id.file_name);
        path
    }

    /// Location of the in-progress download
    pub fn partial_path(root: &Path, id: &ResourceId, kind: ResourceKind) -> PathBuf {
        let mut path = Self::full_path(root, id, kind).into_os_string();
        path.push(PARTIAL_SUFFIX);
        PathBuf::from(path)
    }

    /// Whether a cache file name belongs to an unfinished download
    pub fn is_partial(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.ends_with(PARTIAL_SUFFIX))
            .unwrap_or(false)
    }
}
