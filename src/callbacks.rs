//! Implementation of different callback functions.
use crate::core::estimators::{BasicEstimators, Estimators, MeanVar};
use crate::core::Checkpoint;
use crate::integrators::weighted_average;
use log::{debug, warn};
use num_traits::{Float, FromPrimitive};
use serde::Serialize;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trait for implementing callbacks for iterative MC algorithms
pub trait Callback<T, R, E, A>
where
    T: Copy,
{
    /// This method is called after each successfully finished iteration and may print information
    /// about it.
    fn print(&self, chkpts: &[Checkpoint<R, E, A>]);
}

/// A callback function that does nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct SinkCallback {}

impl<T, R, E, A> Callback<T, R, E, A> for SinkCallback
where
    T: Copy,
{
    fn print(&self, _: &[Checkpoint<R, E, A>]) {}
}

/// Logs the result of the latest iteration together with the cumulative result of all iterations
/// so far at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCallback {}

impl<T, R, E, A> Callback<T, R, E, A> for LogCallback
where
    T: Display + Float + FromPrimitive,
    E: Estimators<T>,
{
    fn print(&self, chkpts: &[Checkpoint<R, E, A>]) {
        if let Some(last) = chkpts.last() {
            let it = last.estimators();
            let (cumulative, chi2) = weighted_average(
                chkpts
                    .iter()
                    .map(|c| MeanVar::new(c.estimators().mean(), c.estimators().var())),
            );
            let calls: usize = chkpts.iter().map(|c| c.estimators().calls()).sum();

            debug!(
                "[iteration {}: N={} E={} \u{b1} {}] [cumulative: N={} E={} \u{b1} {} chi2/dof={}]",
                chkpts.len() - 1,
                it.calls(),
                it.mean(),
                it.std(),
                calls,
                cumulative.mean(),
                cumulative.std(),
                chi2
            );
        }
    }
}

/// Writes all checkpoints as JSON to a file after every iteration, replacing the previous content.
#[derive(Clone, Debug)]
pub struct FileWriterCallback {
    path: PathBuf,
}

impl FileWriterCallback {
    /// Constructor.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn write<S: Serialize>(&self, value: &S) -> crate::error::Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }
}

impl<T, R, E, A> Callback<T, R, E, A> for FileWriterCallback
where
    T: Copy,
    R: Serialize,
    E: Serialize,
    A: Serialize,
{
    fn print(&self, chkpts: &[Checkpoint<R, E, A>]) {
        if let Err(err) = self.write(&chkpts) {
            warn!("could not write checkpoints to {}: {}", self.path.display(), err);
        }
    }
}
