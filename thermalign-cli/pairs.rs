use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::BatchError;

/// A thermal image and the visible image sharing its sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub thermal: PathBuf,
    pub visible: PathBuf,
    pub sequence_id: String,
}

/// Result of scanning a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairSet {
    /// Sorted by sequence id
    pub pairs: Vec<ImagePair>,
    pub unmatched_thermal: usize,
    pub unmatched_visible: usize,
}

/// Joins `<prefix>_<seq>_<thermal suffix>.<ext>` files with their
/// `<prefix>_<seq>_<visible suffix>.<ext>` counterparts.
#[derive(Debug, Clone)]
pub struct PairResolver {
    thermal_suffix: String,
    visible_suffix: String,
    extensions: Vec<String>,
}

enum Role {
    Thermal,
    Visible,
}

impl Default for PairResolver {
    fn default() -> Self {
        Self::new("T", "Z", &["jpg", "jpeg", "png", "tif", "tiff"])
    }
}

impl PairResolver {
    pub fn new<S: AsRef<str>>(thermal_suffix: &str, visible_suffix: &str, extensions: &[S]) -> Self {
        Self {
            thermal_suffix: thermal_suffix.to_string(),
            visible_suffix: visible_suffix.to_string(),
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
    }

    /// Sequence id and role from a file name, if it follows the convention
    fn classify(&self, path: &Path) -> Option<(String, Role)> {
        if !self.has_allowed_extension(path) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 3 {
            return None;
        }
        let suffix = parts[parts.len() - 1];
        let sequence_id = parts[parts.len() - 2].to_string();
        if suffix == self.thermal_suffix {
            Some((sequence_id, Role::Thermal))
        } else if suffix == self.visible_suffix {
            Some((sequence_id, Role::Visible))
        } else {
            None
        }
    }

    /// Enumerate `dir` once and pair files by sequence id
    pub fn resolve(&self, dir: &Path) -> Result<PairSet, BatchError> {
        if !dir.is_dir() {
            return Err(BatchError::MissingDirectory(dir.to_path_buf()));
        }
        let read_error = |source| BatchError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut thermal: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut visible: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in files {
            let Some((sequence_id, role)) = self.classify(&path) else {
                continue;
            };
            let bucket = match role {
                Role::Thermal => &mut thermal,
                Role::Visible => &mut visible,
            };
            if let Some(existing) = bucket.get(&sequence_id) {
                log::warn!(
                    "Ignoring {}: sequence id {} already taken by {}",
                    path.display(),
                    sequence_id,
                    existing.display()
                );
                continue;
            }
            bucket.insert(sequence_id, path);
        }

        let mut set = PairSet::default();
        for (sequence_id, thermal_path) in thermal {
            match visible.remove(&sequence_id) {
                Some(visible_path) => set.pairs.push(ImagePair {
                    thermal: thermal_path,
                    visible: visible_path,
                    sequence_id,
                }),
                None => {
                    log::info!("No visible image for {}", thermal_path.display());
                    set.unmatched_thermal += 1;
                }
            }
        }
        set.unmatched_visible = visible.len();

        Ok(set)
    }
}

/// Output file name: the thermal name with its last `_` token replaced
pub fn aligned_file_name(thermal: &Path, aligned_suffix: &str) -> Option<OsString> {
    let stem = thermal.file_stem()?.to_str()?;
    let (head, _) = stem.rsplit_once('_')?;
    let mut name = format!("{}_{}", head, aligned_suffix);
    if let Some(ext) = thermal.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    Some(name.into())
}
