use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::NamingConfig;
use crate::error::{MergeError, Result};

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("identifier pattern is valid"))
}

/// A fixed-width numeric identifier naming one recording session.
///
/// Cameras number sessions with exactly four digits, so anything else is
/// rejected before any filesystem access happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn parse(raw: &str) -> Result<Self> {
        if id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(MergeError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl NamingConfig {
    /// Path of the video asset recorded under `id`.
    pub fn video_asset(&self, dir: &Path, id: &RecordingId) -> PathBuf {
        dir.join(format!("{}{}.{}", self.prefix, id, self.video_extension))
    }

    /// Path of the GCSV log asset recorded under `id`.
    pub fn log_asset(&self, dir: &Path, id: &RecordingId) -> PathBuf {
        dir.join(format!("{}{}.{}", self.prefix, id, self.log_extension))
    }
}

/// Two chronologically adjacent recordings to be joined, first then second.
#[derive(Debug, Clone)]
pub struct RecordingPair {
    pub first: RecordingId,
    pub second: RecordingId,
}

impl RecordingPair {
    /// Validates both raw identifiers; fails on the first malformed one.
    pub fn parse(first: &str, second: &str) -> Result<Self> {
        Ok(Self {
            first: RecordingId::parse(first)?,
            second: RecordingId::parse(second)?,
        })
    }

    /// Output names are a deterministic function of the two identifiers.
    pub fn video_output(&self, dir: &Path, naming: &NamingConfig) -> PathBuf {
        dir.join(format!(
            "{}{}{}{}.{}",
            naming.prefix, self.first, naming.separator, self.second, naming.video_extension
        ))
    }

    pub fn log_output(&self, dir: &Path, naming: &NamingConfig) -> PathBuf {
        dir.join(format!(
            "{}{}{}{}.{}",
            naming.prefix, self.first, naming.separator, self.second, naming.log_extension
        ))
    }
}
