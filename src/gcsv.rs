use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{MergeError, Result};

/// Literal column-name row separating a GCSV header block from its data rows.
pub const MARKER_LINE: &str = "t,gx,gy,gz,ax,ay,az";

/// Byte offset of the first data row: everything after the first marker line.
///
/// `None` when the file contains no marker line at all.
fn data_offset(content: &str) -> Option<usize> {
    let mut pos = 0;
    for line in content.split_inclusive('\n') {
        pos += line.len();
        let stripped = line.strip_suffix('\n').unwrap_or(line);
        let stripped = stripped.strip_suffix('\r').unwrap_or(stripped);
        if stripped == MARKER_LINE {
            return Some(pos);
        }
    }
    None
}

/// Offset just past the first line, the fallback when no marker is present.
fn first_line_offset(content: &str) -> usize {
    content.find('\n').map_or(content.len(), |i| i + 1)
}

/// Merges two GCSV logs: `first` is copied byte-for-byte, then the data rows
/// of `second` (everything after its marker line) are appended.
///
/// When `second` has no marker line, exactly its first line is skipped
/// instead. That is a guessed one-line-header heuristic, so it warns loudly.
/// Neither input is ever modified; re-running produces identical output.
pub async fn merge_logs(first: &Path, second: &Path, output: &Path) -> Result<usize> {
    for input in [first, second] {
        if !tokio::fs::try_exists(input).await? {
            return Err(MergeError::MissingInput(input.to_path_buf()));
        }
    }

    tokio::fs::copy(first, output).await?;

    let second_content = tokio::fs::read_to_string(second).await?;
    let offset = match data_offset(&second_content) {
        Some(offset) => offset,
        None => {
            warn!(
                "No '{}' marker in {}; falling back to skipping its first line",
                MARKER_LINE,
                second.display()
            );
            first_line_offset(&second_content)
        }
    };
    let tail = &second_content[offset..];

    let mut out = tokio::fs::OpenOptions::new()
        .append(true)
        .open(output)
        .await?;
    out.write_all(tail.as_bytes()).await?;
    out.flush().await?;

    let rows = tail.lines().count();
    info!("📈 Log written: {} ({} data rows appended)", output.display(), rows);
    Ok(rows)
}
