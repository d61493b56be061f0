use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::MergeError;
use crate::gcsv;
use crate::media::{FfmpegJoiner, MediaConcatenator, MediaJoiner};
use crate::recording::RecordingPair;

/// States of one merge invocation. Every stage is a hard gate; a failure in
/// any of them is terminal, there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Start,
    Validated,
    VideoDone,
    LogDone,
    Complete,
}

impl MergeStage {
    fn next(self) -> Self {
        match self {
            Self::Start => Self::Validated,
            Self::Validated => Self::VideoDone,
            Self::VideoDone => Self::LogDone,
            Self::LogDone => Self::Complete,
            Self::Complete => Self::Complete,
        }
    }
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "identifier validation",
            Self::Validated => "video concatenation",
            Self::VideoDone => "log merge",
            Self::LogDone => "completion",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// A merge failure, carrying the stage that was being attempted.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: MergeStage,
    #[source]
    pub source: MergeError,
}

/// Outcome of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub video_output: PathBuf,
    pub log_output: PathBuf,
    pub appended_rows: usize,
    pub elapsed: Duration,
}

/// Runs the merge operation stage by stage: validate identifiers, join the
/// videos, join the logs. Fixed order, sequential, blocking on the external
/// tool.
pub struct MergePipeline<J: MediaJoiner> {
    config: Config,
    working_dir: PathBuf,
    concatenator: MediaConcatenator<J>,
}

impl MergePipeline<FfmpegJoiner> {
    pub fn new(config: Config, working_dir: PathBuf) -> Self {
        let joiner = FfmpegJoiner::new(&config.ffmpeg);
        Self::with_joiner(config, working_dir, joiner)
    }
}

impl<J: MediaJoiner> MergePipeline<J> {
    /// Construct with an explicit joiner backend (tests use a fake).
    pub fn with_joiner(config: Config, working_dir: PathBuf, joiner: J) -> Self {
        let concatenator = MediaConcatenator::new(joiner, working_dir.clone());
        Self {
            config,
            working_dir,
            concatenator,
        }
    }

    /// Merges the recording pair named by the two raw identifiers.
    ///
    /// Identifier validation runs before any filesystem access; a malformed
    /// identifier means nothing is touched.
    pub async fn run(&self, first: &str, second: &str) -> Result<MergeReport, StageError> {
        let start_time = Instant::now();
        let mut stage = MergeStage::Start;

        let pair = RecordingPair::parse(first, second).map_err(|e| StageError {
            stage,
            source: e,
        })?;
        stage = stage.next();
        debug!("🔎 Identifiers validated: {} + {}", pair.first, pair.second);

        let naming = &self.config.naming;
        let dir = &self.working_dir;
        let video_output = pair.video_output(dir, naming);
        self.concatenator
            .concat(
                &naming.video_asset(dir, &pair.first),
                &naming.video_asset(dir, &pair.second),
                &video_output,
            )
            .await
            .map_err(|e| StageError { stage, source: e })?;
        stage = stage.next();

        let log_output = pair.log_output(dir, naming);
        let appended_rows = gcsv::merge_logs(
            &naming.log_asset(dir, &pair.first),
            &naming.log_asset(dir, &pair.second),
            &log_output,
        )
        .await
        .map_err(|e| StageError { stage, source: e })?;
        stage = stage.next();

        let final_stage = stage.next();
        debug!("🏁 State machine reached {:?}", final_stage);

        let elapsed = start_time.elapsed();
        info!(
            "🎉 Merged pair {}+{} in {:.2}s",
            pair.first,
            pair.second,
            elapsed.as_secs_f64()
        );

        Ok(MergeReport {
            video_output,
            log_output,
            appended_rows,
            elapsed,
        })
    }
}
