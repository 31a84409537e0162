//! Persisting generated test scripts under `scripts/tc_<id>/`

use std::path::PathBuf;
use tracing::info;

use vv_common::{Result, Storage};

/// Identifier-safe slug of a test case name.
///
/// Lowercases, collapses every run of non-alphanumeric characters into `_`
/// and trims underscores; falls back to `test_case` when nothing is left.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        "test_case".to_string()
    } else {
        slug
    }
}

/// pytest module file name for a test case
pub fn script_file_name(test_case_name: &str) -> String {
    format!("test_{}.py", slugify(test_case_name))
}

#[derive(Debug, Clone)]
pub struct ScriptService {
    storage: Storage,
}

impl ScriptService {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Write `content` for a test case, replacing an earlier script of the
    /// same name. Returns the file path and file name.
    pub async fn write_script_for_test_case(
        &self,
        test_case_id: i64,
        test_case_name: &str,
        content: &str,
    ) -> Result<(PathBuf, String)> {
        let dir = self.storage.script_dir_for_test_case(test_case_id)?;
        let filename = script_file_name(test_case_name);
        let path = dir.join(&filename);
        tokio::fs::write(&path, content).await?;
        info!("Wrote script for test case {} to {}", test_case_id, path.display());
        Ok((path, filename))
    }
}
