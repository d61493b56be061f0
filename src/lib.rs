//! gyromerge
//!
//! Joins a pair of chronologically adjacent action-camera recordings: the
//! video streams are concatenated losslessly through ffmpeg's concat demuxer,
//! and the matching GCSV gyro/accelerometer logs are merged by appending the
//! second log's data rows to the first log.

pub mod config;
pub mod error;
pub mod gcsv;
pub mod media;
pub mod pipeline;
pub mod recording;
pub mod trf;

// Re-export main types for easy access
pub use crate::config::{Config, FfmpegConfig, NamingConfig};
pub use crate::error::MergeError;
pub use crate::media::{FfmpegJoiner, MediaConcatenator, MediaJoiner};
pub use crate::pipeline::{MergePipeline, MergeReport, MergeStage, StageError};
pub use crate::recording::{RecordingId, RecordingPair};
pub use crate::trf::{StabilityMetrics, Transform, TrfComparison, TrfFormat};
