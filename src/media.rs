use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::FfmpegConfig;
use crate::error::{MergeError, Result};

/// Joins compatible media streams losslessly, directed by an ordered
/// concat manifest. Narrow seam so tests can substitute a fake backend.
#[async_trait]
pub trait MediaJoiner: Send + Sync {
    async fn join(&self, manifest: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg concat demuxer in stream-copy mode. The process exit status is
/// the sole success signal; a failed run may leave a partial output behind,
/// which matches what ffmpeg itself does.
pub struct FfmpegJoiner {
    binary: String,
}

impl FfmpegJoiner {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            binary: config.binary.clone(),
        }
    }
}

#[async_trait]
impl MediaJoiner for FfmpegJoiner {
    async fn join(&self, manifest: &Path, output: &Path) -> Result<()> {
        let status = tokio::process::Command::new(&self.binary)
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy", "-y"])
            .arg(output)
            .status()
            .await?;

        if !status.success() {
            return Err(MergeError::ExternalTool {
                tool: self.binary.clone(),
                status,
            });
        }

        Ok(())
    }
}

/// Concatenates two video assets through a [`MediaJoiner`].
pub struct MediaConcatenator<J: MediaJoiner> {
    joiner: J,
    /// Where the ephemeral concat manifest lives; injectable so tests do not
    /// touch a shared namespace.
    manifest_dir: PathBuf,
}

impl<J: MediaJoiner> MediaConcatenator<J> {
    pub fn new(joiner: J, manifest_dir: PathBuf) -> Self {
        Self {
            joiner,
            manifest_dir,
        }
    }

    /// Joins `first` and `second` losslessly into `output`, in that order.
    ///
    /// Both inputs must already exist; the check short-circuits on the first
    /// missing file and names it. The manifest is uniquely named per
    /// invocation and removed on every exit path, success or failure.
    pub async fn concat(&self, first: &Path, second: &Path, output: &Path) -> Result<()> {
        for input in [first, second] {
            if !tokio::fs::try_exists(input).await? {
                return Err(MergeError::MissingInput(input.to_path_buf()));
            }
        }

        let mut manifest = tempfile::Builder::new()
            .prefix("gyromerge-concat-")
            .suffix(".txt")
            .tempfile_in(&self.manifest_dir)?;
        writeln!(manifest, "file '{}'", first.display())?;
        writeln!(manifest, "file '{}'", second.display())?;
        manifest.flush()?;
        debug!("📝 Wrote concat manifest: {}", manifest.path().display());

        info!(
            "🎬 Concatenating {} + {} -> {}",
            first.display(),
            second.display(),
            output.display()
        );
        // NamedTempFile removes the manifest on drop, whichever way we leave.
        self.joiner.join(manifest.path(), output).await?;

        info!("✅ Video written: {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the manifest content it was handed and writes a stub output.
    struct RecordingJoiner {
        manifests: Mutex<Vec<String>>,
    }

    impl RecordingJoiner {
        fn new() -> Self {
            Self {
                manifests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaJoiner for RecordingJoiner {
        async fn join(&self, manifest: &Path, output: &Path) -> Result<()> {
            let content = std::fs::read_to_string(manifest)?;
            self.manifests.lock().unwrap().push(content);
            std::fs::write(output, b"joined")?;
            Ok(())
        }
    }

    /// Fails after confirming the manifest existed at call time.
    struct FailingJoiner;

    #[async_trait]
    impl MediaJoiner for FailingJoiner {
        async fn join(&self, manifest: &Path, _output: &Path) -> Result<()> {
            assert!(manifest.exists());
            Err(MergeError::MissingInput(manifest.to_path_buf()))
        }
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"stub").unwrap();
    }

    #[tokio::test]
    async fn manifest_lists_inputs_in_invocation_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("RC_0001.MP4");
        let b = dir.path().join("RC_0002.MP4");
        touch(&a);
        touch(&b);

        let concatenator = MediaConcatenator::new(RecordingJoiner::new(), dir.path().to_path_buf());
        let output = dir.path().join("RC_0001-0002.MP4");
        concatenator.concat(&a, &b, &output).await.unwrap();

        let manifests = concatenator.joiner.manifests.lock().unwrap();
        assert_eq!(
            manifests[0],
            format!("file '{}'\nfile '{}'\n", a.display(), b.display())
        );
        assert!(output.exists());
    }

    #[tokio::test]
    async fn short_circuits_on_first_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("RC_0001.MP4");
        let b = dir.path().join("RC_0002.MP4");
        touch(&b);

        let concatenator = MediaConcatenator::new(RecordingJoiner::new(), dir.path().to_path_buf());
        let output = dir.path().join("RC_0001-0002.MP4");
        let err = concatenator.concat(&a, &b, &output).await.unwrap_err();

        assert!(matches!(err, MergeError::MissingInput(p) if p == a));
        assert!(!output.exists());
        // No manifest was created either.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("gyromerge-concat-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn manifest_is_removed_on_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("RC_0001.MP4");
        let b = dir.path().join("RC_0002.MP4");
        touch(&a);
        touch(&b);
        let output = dir.path().join("RC_0001-0002.MP4");

        let ok = MediaConcatenator::new(RecordingJoiner::new(), dir.path().to_path_buf());
        ok.concat(&a, &b, &output).await.unwrap();

        let failing = MediaConcatenator::new(FailingJoiner, dir.path().to_path_buf());
        failing.concat(&a, &b, &output).await.unwrap_err();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("gyromerge-concat-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
