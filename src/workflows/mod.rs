// src/workflows/mod.rs: one file per wrapped tool family.
// Every function here only builds tasks; nothing is executed.

pub mod alignment;
pub mod association;
pub mod biom;
pub mod general;
pub mod samtools;
pub mod sixteen;
pub mod subread;
pub mod usearch;
pub mod visualization;
pub mod wgs;

use std::path::Path;

use crate::config::defs::PipelineError;


pub(crate) fn require_inputs<P: AsRef<Path>>(files: &[P], workflow: &str) -> Result<(), PipelineError> {
    if files.is_empty() {
        return Err(PipelineError::InvalidConfig(format!("{}: no input files given", workflow)));
    }
    Ok(())
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
