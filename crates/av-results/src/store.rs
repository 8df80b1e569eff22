//! Run loading API.

use std::path::PathBuf;

use av_core::InstanceId;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::naming::parse_run_id;
use crate::source::{DirectorySource, FileHandle, RunSource};
use crate::types::{InstrumentRecord, LoadWarning, MergedInstance, RowError, RunDataset};
use crate::{ResultsError, ResultsResult};

/// Loads and tags the runs of an instance from a [`RunSource`].
#[derive(Clone)]
pub struct RunStore<S> {
    source: S,
}

impl RunStore<DirectorySource> {
    /// Store over a flat directory of `<prefix>_<instance>_<run>.<ext>` files.
    pub fn open(root_dir: PathBuf, prefix: impl Into<String>, extensions: Vec<String>) -> Self {
        Self::new(DirectorySource::new(root_dir, prefix, extensions))
    }
}

impl<S: RunSource> RunStore<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Loads every run file of `instance`.
    ///
    /// Fails with [`ResultsError::NotFound`] when no file matches. Files with a
    /// malformed run token, an unreadable table or a row without iteration
    /// are skipped and reported in [`MergedInstance::warnings`].
    pub fn load(&self, instance: &InstanceId) -> ResultsResult<MergedInstance> {
        let files = self.source.enumerate_files(instance)?;
        if files.is_empty() {
            return Err(ResultsError::NotFound {
                instance: instance.clone(),
            });
        }
        debug!(instance = %instance, files = files.len(), "loading run files");

        // Parsed in parallel, merged in file-name order.
        let outcomes: Vec<Result<RunDataset, LoadWarning>> =
            files.par_iter().map(|file| self.load_file(file)).collect();

        let mut merged = MergedInstance::new(instance.clone());
        for outcome in outcomes {
            match outcome {
                Ok(run) => {
                    merged.insert(run);
                }
                Err(warning) => merged.warnings.push(warning),
            }
        }
        for warning in &merged.warnings {
            warn!(instance = %instance, "{}", warning);
        }

        info!(
            instance = %instance,
            runs = merged.runs.len(),
            records = merged.total_records(),
            skipped = merged.warnings.len(),
            "instance loaded"
        );
        Ok(merged)
    }

    fn load_file(&self, file: &FileHandle) -> Result<RunDataset, LoadWarning> {
        let run = parse_run_id(&file.name).map_err(|_| LoadWarning::MalformedRunId {
            file: file.name.clone(),
        })?;

        let table = self
            .source
            .read_table(file)
            .map_err(|err| LoadWarning::UnreadableTable {
                file: file.name.clone(),
                message: err.to_string(),
            })?;

        let records = table
            .iter()
            .enumerate()
            .map(|(row_index, row)| {
                InstrumentRecord::from_row(run, row).map_err(|err| match err {
                    RowError::MissingIteration | RowError::InvalidIteration => {
                        LoadWarning::MissingIteration {
                            file: file.name.clone(),
                            row: row_index,
                        }
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunDataset::new(run, file.name.clone(), records))
    }
}
