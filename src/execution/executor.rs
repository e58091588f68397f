//! Stage executor - crash-visible bookkeeping around one execution group

use crate::error::Result;
use crate::persistence::{keys, SharedCache};
use crate::serialization::{decode_names, encode_names, SharedSerializer};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// Bracket around one group's run
///
/// Entering marks the group `in_progress`. Exiting clears that mark and, if
/// the group succeeded, appends its stages to the cumulative `done` list.
pub struct StageExecutor {
    cache: SharedCache,
    serializer: SharedSerializer,
    stages: Vec<String>,
}

impl StageExecutor {
    /// Mark `stages` as in progress
    pub async fn enter(
        cache: SharedCache,
        serializer: SharedSerializer,
        stages: Vec<String>,
    ) -> Result<Self> {
        let record = encode_names(serializer.as_ref(), &stages)?;
        cache.write(keys::IN_PROGRESS, record).await?;
        debug!(?stages, "group entered");

        Ok(Self {
            cache,
            serializer,
            stages,
        })
    }

    /// Stage names of the bracketed group
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Hand every stage name of the group to `run`
    ///
    /// `run` decides how the group executes: serially, or fanned out over a
    /// worker pool.
    pub async fn execute<F, Fut, T>(&self, run: F) -> Result<T>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        run(self.stages.clone()).await
    }

    /// Close the bracket
    ///
    /// `in_progress` is deleted even when recording the group as done fails.
    pub async fn exit(self, succeeded: bool) -> Result<()> {
        let recorded = if succeeded {
            self.record_done().await
        } else {
            Ok(())
        };
        let cleared = self.cache.delete(keys::IN_PROGRESS).await;

        debug!(stages = ?self.stages, succeeded, "group exited");
        recorded?;
        cleared?;
        Ok(())
    }

    async fn record_done(&self) -> Result<()> {
        let group = match self.cache.read(keys::IN_PROGRESS).await? {
            Some(stored) => decode_names(self.serializer.as_ref(), &stored)?,
            None => self.stages.clone(),
        };

        let mut done = match self.cache.read(keys::DONE).await? {
            Some(stored) => decode_names(self.serializer.as_ref(), &stored)?,
            None => Vec::new(),
        };
        done.extend(group);

        let record = encode_names(self.serializer.as_ref(), &done)?;
        self.cache.write(keys::DONE, record).await?;
        Ok(())
    }

    /// Run `run` inside a bracket for `stages`
    ///
    /// Exit bookkeeping runs whether or not `run` fails. An error from `run`
    /// wins over an error from the bookkeeping.
    pub async fn scope<F, Fut, T>(
        cache: SharedCache,
        serializer: SharedSerializer,
        stages: Vec<String>,
        run: F,
    ) -> Result<T>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let executor = Self::enter(cache, serializer, stages).await?;
        let outcome = executor.execute(run).await;

        match outcome {
            Ok(value) => {
                executor.exit(true).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(exit_err) = executor.exit(false).await {
                    warn!("Failed to clear in-progress group after error: {}", exit_err);
                }
                Err(e)
            }
        }
    }
}

/// Persisted progress, as left behind by the executor brackets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Group that was executing when the process stopped
    pub in_progress: Option<Vec<String>>,

    /// Stages of every group that finished
    pub done: Vec<String>,
}

impl ProgressReport {
    /// Neither a running group nor unfinished progress is recorded
    pub fn is_clean(&self) -> bool {
        self.in_progress.is_none() && self.done.is_empty()
    }
}

/// Read the bookkeeping records of an interrupted or finished run
pub async fn inspect_progress(
    cache: &SharedCache,
    serializer: &SharedSerializer,
) -> Result<ProgressReport> {
    let in_progress = match cache.read(keys::IN_PROGRESS).await? {
        Some(stored) => Some(decode_names(serializer.as_ref(), &stored)?),
        None => None,
    };
    let done = match cache.read(keys::DONE).await? {
        Some(stored) => decode_names(serializer.as_ref(), &stored)?,
        None => Vec::new(),
    };

    Ok(ProgressReport { in_progress, done })
}
