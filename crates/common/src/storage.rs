//! On-disk layout under `DATA_DIR`
//!
//! ```text
//! DATA_DIR/
//!   uploads/           SRS uploads
//!   scripts/tc_<id>/   generated test scripts
//!   runs/run_<id>/     execution artifacts (run.log, results.xml)
//! ```

use std::path::{Path, PathBuf};

use crate::Result;

pub const RUN_LOG: &str = "run.log";
pub const JUNIT_XML: &str = "results.xml";

/// Builds and creates storage paths under the data directory
#[derive(Debug, Clone)]
pub struct Storage {
    base: PathBuf,
}

impl Storage {
    /// Root the layout at `base`, creating the core directories
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        let storage = Self {
            base: base.as_ref().to_path_buf(),
        };
        std::fs::create_dir_all(storage.uploads_dir())?;
        std::fs::create_dir_all(storage.scripts_dir())?;
        std::fs::create_dir_all(storage.runs_dir())?;
        Ok(storage)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.base.join("uploads")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.base.join("scripts")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.base.join("runs")
    }

    /// Path for an uploaded SRS file (the name must already be sanitized)
    pub fn path_for_upload(&self, filename: &str) -> PathBuf {
        self.uploads_dir().join(filename)
    }

    /// Directory holding the scripts of one test case, created on demand
    pub fn script_dir_for_test_case(&self, test_case_id: i64) -> Result<PathBuf> {
        let path = self.scripts_dir().join(format!("tc_{}", test_case_id));
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Directory for a run's artifacts, created on demand
    pub fn run_dir(&self, run_id: i64) -> Result<PathBuf> {
        let path = self.runs_dir().join(format!("run_{}", run_id));
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Path of an artifact inside a run directory.
    ///
    /// Does not create anything, so lookups for unknown runs stay side-effect free.
    pub fn run_artifact(&self, run_id: i64, relative_name: &str) -> PathBuf {
        self.runs_dir()
            .join(format!("run_{}", run_id))
            .join(relative_name)
    }
}
