//! On-disk transform parameter files written by the B-spline engine.
//!
//! Each coregistration call writes `TransformParameters.<k>.json` into the
//! engine's output directory. The files outlive the call; callers remove
//! them with [`TransformArtifact::cleanup`]. The directory itself is only
//! removed when the artifact owns it.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use mdreg_core::transform::BSplineParameters;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Serialized form of a parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParameterFile {
    transform: String,
    index: usize,
    dimension: usize,
    #[serde(flatten)]
    parameters: BSplineParameters,
}

/// Handle to one parameter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformArtifact {
    path: PathBuf,
    owns_dir: bool,
}

impl TransformArtifact {
    pub fn file_name(index: usize) -> String {
        format!("TransformParameters.{}.json", index)
    }

    /// Write `parameters` as file number `index` in `dir`, creating it if needed.
    pub fn write(dir: &Path, index: usize, parameters: &BSplineParameters) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(index));
        let file = ParameterFile {
            transform: "BSplineTransform".to_string(),
            index,
            dimension: parameters.grid_size.len(),
            parameters: parameters.clone(),
        };
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "wrote transform parameters");
        Ok(Self { path, owns_dir: false })
    }

    /// Handle to an existing file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owns_dir: false,
        }
    }

    /// Let [`cleanup`](Self::cleanup) remove the parent directory once it is empty.
    pub fn owning_directory(mut self) -> Self {
        self.owns_dir = true;
        self
    }

    pub fn owns_directory(&self) -> bool {
        self.owns_dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> Result<BSplineParameters> {
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let file: ParameterFile = serde_json::from_reader(reader)?;
        Ok(file.parameters)
    }

    /// Delete the file, and its directory once that is empty if owned.
    /// Deleting an already removed file is not an error.
    pub fn cleanup(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if !self.owns_dir {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            let empty = fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(false);
            if empty {
                if let Err(e) = fs::remove_dir(dir) {
                    tracing::debug!(dir = %dir.display(), error = %e, "could not remove output directory");
                }
            }
        }
        Ok(())
    }
}
