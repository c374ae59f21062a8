//! On-disk layout for a job: `<kind>/<sanitized-filename>`

use crate::state::ResourceKind;
use crate::storage::traits::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Longest file name produced by [`sanitize_file_name`]
const MAX_FILE_NAME_LEN: usize = 100;

/// Longest extension kept intact when a name is shortened
const MAX_EXTENSION_LEN: usize = 10;

/// Assigns relative paths to resources of one job
///
/// Each assigned path is reserved for the lifetime of the allocator, even if
/// the download later fails, so no two resources ever share a path.
pub struct PathAllocator {
    job_dir: PathBuf,
    assigned: Mutex<Assignments>,
}

#[derive(Default)]
struct Assignments {
    taken: HashSet<PathBuf>,
    /// Next suffix to try per base path
    next_suffix: HashMap<PathBuf, u32>,
}

impl PathAllocator {
    pub fn new(job_dir: PathBuf) -> Self {
        Self {
            job_dir,
            assigned: Mutex::new(Assignments::default()),
        }
    }

    /// Reserves a relative path for a resource
    ///
    /// The base path is `<kind>/<sanitized last path segment>`. When that is
    /// already taken, a counter suffix is inserted before the extension:
    /// `logo.png`, `logo-1.png`, `logo-2.png`, ...
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path relative to the job directory
    /// * `Err(StorageError::OutsideRoot)` - The path would escape the job directory
    pub fn assign(&self, url: &Url, kind: ResourceKind) -> StorageResult<PathBuf> {
        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        let file_name = sanitize_file_name(segment);
        let (stem, ext) = split_extension(&file_name);

        let dir = PathBuf::from(kind.dir_name());
        let base = dir.join(&file_name);

        let mut assigned = self.assigned.lock();
        let mut candidate = base.clone();

        if assigned.taken.contains(&candidate) {
            let mut suffix = assigned.next_suffix.get(&base).copied().unwrap_or(1);
            loop {
                candidate = dir.join(format!("{}-{}{}", stem, suffix, ext));
                suffix += 1;
                if !assigned.taken.contains(&candidate) {
                    break;
                }
            }
            assigned.next_suffix.insert(base, suffix);
        }

        resolve_within(&self.job_dir, &candidate)?;
        assigned.taken.insert(candidate.clone());

        Ok(candidate)
    }

    /// Resolves a relative path against the job directory, with the traversal guard
    pub fn resolve(&self, relative: &Path) -> StorageResult<PathBuf> {
        resolve_within(&self.job_dir, relative)
    }

    /// Number of paths reserved so far
    pub fn assigned_count(&self) -> usize {
        self.assigned.lock().taken.len()
    }
}

/// Joins `relative` onto `root`, refusing anything that could land outside it
///
/// Only plain path components are accepted: no `..`, no `.`, no root or
/// drive prefix, and the path must not be empty.
pub fn resolve_within(root: &Path, relative: &Path) -> StorageResult<PathBuf> {
    if relative.as_os_str().is_empty() {
        return Err(StorageError::OutsideRoot("empty path".to_string()));
    }

    for component in relative.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(StorageError::OutsideRoot(relative.display().to_string()));
            }
        }
    }

    let full = root.join(relative);
    if !full.starts_with(root) {
        return Err(StorageError::OutsideRoot(relative.display().to_string()));
    }

    Ok(full)
}

/// Turns a URL path segment into a safe file name
///
/// - Percent-decodes the segment
/// - Replaces anything outside `[A-Za-z0-9._-]` with `_`
/// - Strips leading dots (no hidden files, no `..`)
/// - Caps the length, keeping a short extension intact
/// - Falls back to `index` when nothing is left
pub fn sanitize_file_name(segment: &str) -> String {
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let cleaned: String = decoded
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "index".to_string();
    }

    if cleaned.len() <= MAX_FILE_NAME_LEN {
        return cleaned.to_string();
    }

    // all characters are ASCII here, so byte slicing is safe
    let (stem, ext) = split_extension(cleaned);
    let keep = MAX_FILE_NAME_LEN - ext.len();
    format!("{}{}", &stem[..keep.min(stem.len())], ext)
}

/// Splits `name.ext` into (`name`, `.ext`); the extension is empty when absent or too long
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && file_name.len() - idx <= MAX_EXTENSION_LEN + 1 => {
            file_name.split_at(idx)
        }
        _ => (file_name, ""),
    }
}
