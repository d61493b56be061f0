//! VidStab TRF transform-file analysis.
//!
//! TRF files record the per-frame stabilization transforms (dx, dy, da) that
//! vidstabdetect measured. Parsing them lets us score how shaky a recording
//! was and compare two stabilization passes.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{MergeError, Result};

/// Byte offset of the first transform record in a binary TRF file.
const BINARY_HEADER_LEN: usize = 20;
/// Binary records hold six little-endian f32s; dx, dy, da come first.
const BINARY_RECORD_LEN: usize = 24;
/// Records with non-finite or absurdly large values are measurement noise
/// and are excluded from the metrics.
const MAX_PLAUSIBLE_VALUE: f64 = 10_000.0;

/// One per-frame stabilization transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub dx: f64,
    pub dy: f64,
    pub da: f64,
}

impl Transform {
    fn is_plausible(&self) -> bool {
        [self.dx, self.dy, self.da]
            .iter()
            .all(|v| v.is_finite() && v.abs() < MAX_PLAUSIBLE_VALUE)
    }
}

/// On-disk flavor of a TRF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrfFormat {
    /// Starts with the `TRF1` magic number.
    Binary,
    /// Old text format: comment lines and whitespace-separated rows.
    Ascii,
    Unknown,
}

/// Detect the file flavor from its leading bytes.
pub fn detect_format(data: &[u8]) -> TrfFormat {
    if data.starts_with(b"TRF1") {
        return TrfFormat::Binary;
    }
    if let Ok(text) = std::str::from_utf8(&data[..data.len().min(256)]) {
        if let Some(first) = text.lines().next() {
            if first.starts_with('#') || first.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                return TrfFormat::Ascii;
            }
        }
    }
    TrfFormat::Unknown
}

/// Parse the ASCII format: `frame_num dx dy da [extra...]` rows, `#` comments.
pub fn parse_ascii(content: &str) -> Vec<Transform> {
    let mut transforms = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            if let (Ok(dx), Ok(dy), Ok(da)) =
                (parts[1].parse(), parts[2].parse(), parts[3].parse())
            {
                transforms.push(Transform { dx, dy, da });
            }
        }
    }
    transforms
}

fn f32_at(data: &[u8], offset: usize) -> Option<f32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(f32::from_le_bytes(bytes))
}

fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Parse the binary format: `TRF1` magic, version, frame count and data size
/// as little-endian u32s, then 24-byte records of six f32s each (dx, dy, da
/// first; the rest is extra vidstab state we ignore).
pub fn parse_binary(data: &[u8]) -> Vec<Transform> {
    if data.len() < BINARY_HEADER_LEN {
        return Vec::new();
    }

    let available = (data.len() - BINARY_HEADER_LEN) / BINARY_RECORD_LEN;
    let frame_count = match u32_at(data, 8) {
        Some(count) if (count as usize) <= available => {
            debug!("TRF header: version={:?}, {} frames", u32_at(data, 4), count);
            count as usize
        }
        other => {
            warn!(
                "TRF header frame count {:?} does not fit the file; estimating {} from size",
                other, available
            );
            available
        }
    };

    let mut transforms = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        let offset = BINARY_HEADER_LEN + i * BINARY_RECORD_LEN;
        let record = (
            f32_at(data, offset),
            f32_at(data, offset + 4),
            f32_at(data, offset + 8),
        );
        match record {
            (Some(dx), Some(dy), Some(da)) => transforms.push(Transform {
                dx: dx as f64,
                dy: dy as f64,
                da: da as f64,
            }),
            _ => break,
        }
    }
    transforms
}

/// Export transforms to the ASCII format, one `frame dx dy da` row each.
pub async fn export_ascii(transforms: &[Transform], output: &Path) -> Result<()> {
    let mut content = String::from("# VidStab transform data\n");
    content.push_str(&format!("# Frame count: {}\n", transforms.len()));
    for (i, t) in transforms.iter().enumerate() {
        content.push_str(&format!("{} {:.6} {:.6} {:.6}\n", i, t.dx, t.dy, t.da));
    }

    let mut file = tokio::fs::File::create(output).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    info!("💾 Exported {} transforms to {}", transforms.len(), output.display());
    Ok(())
}

/// Stability scores over the plausible transforms of one TRF file.
/// Lower instability index means steadier footage.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityMetrics {
    pub frame_count: usize,
    pub valid_frame_count: usize,
    pub dx_rms: f64,
    pub dy_rms: f64,
    pub da_rms: f64,
    pub dx_mean_abs: f64,
    pub dy_mean_abs: f64,
    pub da_mean_abs: f64,
    pub instability_index: f64,
}

fn rms(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    (values.map(|v| v * v).sum::<f64>() / count as f64).sqrt()
}

fn mean_abs(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    values.map(f64::abs).sum::<f64>() / count as f64
}

/// Compute stability metrics, filtering out implausible records first.
/// `None` when nothing usable remains.
pub fn stability_metrics(transforms: &[Transform]) -> Option<StabilityMetrics> {
    let valid: Vec<&Transform> = transforms.iter().filter(|t| t.is_plausible()).collect();
    if valid.is_empty() {
        return None;
    }

    let dx_rms = rms(valid.iter().map(|t| t.dx));
    let dy_rms = rms(valid.iter().map(|t| t.dy));
    let da_rms = rms(valid.iter().map(|t| t.da));

    Some(StabilityMetrics {
        frame_count: transforms.len(),
        valid_frame_count: valid.len(),
        dx_rms,
        dy_rms,
        da_rms,
        dx_mean_abs: mean_abs(valid.iter().map(|t| t.dx)),
        dy_mean_abs: mean_abs(valid.iter().map(|t| t.dy)),
        da_mean_abs: mean_abs(valid.iter().map(|t| t.da)),
        instability_index: dx_rms + dy_rms + da_rms,
    })
}

/// Analyze one TRF file: detect its format, parse the transforms and score
/// stability.
pub async fn analyze_file(path: &Path) -> Result<StabilityMetrics> {
    if !tokio::fs::try_exists(path).await? {
        return Err(MergeError::MissingInput(path.to_path_buf()));
    }

    let data = tokio::fs::read(path).await?;
    let format = detect_format(&data);
    info!(
        "🔬 Analyzing {} ({} bytes, {:?} format)",
        path.display(),
        data.len(),
        format
    );

    let transforms = match format {
        TrfFormat::Ascii => parse_ascii(&String::from_utf8_lossy(&data)),
        // Unknown files get the binary parser as a best effort.
        TrfFormat::Binary | TrfFormat::Unknown => parse_binary(&data),
    };

    let metrics = stability_metrics(&transforms)
        .ok_or_else(|| MergeError::NoTransformData(path.to_path_buf()))?;

    info!(
        "📊 {} frames ({} valid): dx RMS={:.6}, dy RMS={:.6}, da RMS={:.6}",
        metrics.frame_count,
        metrics.valid_frame_count,
        metrics.dx_rms,
        metrics.dy_rms,
        metrics.da_rms
    );
    info!(
        "📉 Instability index: {:.6} (lower = better)",
        metrics.instability_index
    );

    Ok(metrics)
}

/// Outcome of comparing the stability of two TRF files.
#[derive(Debug, Clone)]
pub struct TrfComparison {
    pub first: StabilityMetrics,
    pub second: StabilityMetrics,
    /// File with the lower instability index.
    pub better: PathBuf,
    pub difference: f64,
    pub improvement_pct: f64,
}

/// Analyze two TRF files and report which one is steadier.
pub async fn compare_files(first_path: &Path, second_path: &Path) -> Result<TrfComparison> {
    let first = analyze_file(first_path).await?;
    let second = analyze_file(second_path).await?;

    let (better, difference) = if first.instability_index < second.instability_index {
        (first_path, second.instability_index - first.instability_index)
    } else {
        (second_path, first.instability_index - second.instability_index)
    };
    let worst = first.instability_index.max(second.instability_index);
    let improvement_pct = if worst > 0.0 {
        difference / worst * 100.0
    } else {
        0.0
    };

    info!(
        "⚖️  Instability: {} = {:.6} vs {} = {:.6}",
        first_path.display(),
        first.instability_index,
        second_path.display(),
        second.instability_index
    );
    info!(
        "🏆 Better file: {} ({:.1}% improvement)",
        better.display(),
        improvement_pct
    );

    Ok(TrfComparison {
        first,
        second,
        better: better.to_path_buf(),
        difference,
        improvement_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_trf(transforms: &[(f32, f32, f32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"TRF1");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(transforms.len() as u32).to_le_bytes());
        data.extend_from_slice(&((transforms.len() * BINARY_RECORD_LEN) as u32).to_le_bytes());
        data.extend_from_slice(&[0u8; 4]);
        for &(dx, dy, da) in transforms {
            for v in [dx, dy, da, 1.0f32, 0.0, 0.0] {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn detects_binary_ascii_and_unknown() {
        assert_eq!(detect_format(&binary_trf(&[(1.0, 2.0, 0.1)])), TrfFormat::Binary);
        assert_eq!(detect_format(b"# VidStab transform data\n"), TrfFormat::Ascii);
        assert_eq!(detect_format(b"0 1.5 -2.0 0.01\n"), TrfFormat::Ascii);
        assert_eq!(detect_format(&[0xff, 0xfe, 0x00, 0x01]), TrfFormat::Unknown);
    }

    #[test]
    fn ascii_parser_skips_comments_and_short_rows() {
        let content = "# VidStab transform data\n# Frame count: 2\n\n0 1.5 -2.0 0.01\nbad\n1 0.5 0.25 -0.02 extra extra\n";
        let transforms = parse_ascii(content);
        assert_eq!(
            transforms,
            vec![
                Transform { dx: 1.5, dy: -2.0, da: 0.01 },
                Transform { dx: 0.5, dy: 0.25, da: -0.02 },
            ]
        );
    }

    #[test]
    fn binary_parser_reads_dx_dy_da_from_each_record() {
        let data = binary_trf(&[(1.5, -2.0, 0.01), (0.5, 0.25, -0.02)]);
        let transforms = parse_binary(&data);
        assert_eq!(transforms.len(), 2);
        assert!((transforms[0].dx - 1.5).abs() < 1e-6);
        assert!((transforms[0].dy + 2.0).abs() < 1e-6);
        assert!((transforms[1].da + 0.02).abs() < 1e-6);
    }

    #[test]
    fn binary_parser_estimates_frame_count_when_header_lies() {
        let mut data = binary_trf(&[(1.0, 1.0, 0.0), (2.0, 2.0, 0.0)]);
        // Claim far more frames than the file holds.
        data[8..12].copy_from_slice(&9999u32.to_le_bytes());
        assert_eq!(parse_binary(&data).len(), 2);
    }

    #[test]
    fn metrics_match_hand_computed_values() {
        let transforms = [
            Transform { dx: 3.0, dy: 4.0, da: 0.0 },
            Transform { dx: -3.0, dy: 4.0, da: 0.0 },
        ];
        let metrics = stability_metrics(&transforms).unwrap();
        assert_eq!(metrics.frame_count, 2);
        assert_eq!(metrics.valid_frame_count, 2);
        assert!((metrics.dx_rms - 3.0).abs() < 1e-9);
        assert!((metrics.dy_rms - 4.0).abs() < 1e-9);
        assert!((metrics.da_rms - 0.0).abs() < 1e-9);
        assert!((metrics.dx_mean_abs - 3.0).abs() < 1e-9);
        assert!((metrics.instability_index - 7.0).abs() < 1e-9);
    }

    #[test]
    fn implausible_records_are_excluded_from_metrics() {
        let transforms = [
            Transform { dx: 1.0, dy: 1.0, da: 0.0 },
            Transform { dx: f64::NAN, dy: 0.0, da: 0.0 },
            Transform { dx: 50_000.0, dy: 0.0, da: 0.0 },
        ];
        let metrics = stability_metrics(&transforms).unwrap();
        assert_eq!(metrics.frame_count, 3);
        assert_eq!(metrics.valid_frame_count, 1);
        assert!((metrics.dx_rms - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_plausible_yields_no_metrics() {
        let transforms = [Transform { dx: f64::INFINITY, dy: 0.0, da: 0.0 }];
        assert!(stability_metrics(&transforms).is_none());
    }

    #[tokio::test]
    async fn exported_ascii_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.trf");
        let transforms = vec![
            Transform { dx: 1.5, dy: -2.0, da: 0.01 },
            Transform { dx: 0.5, dy: 0.25, da: -0.02 },
        ];

        export_ascii(&transforms, &path).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# VidStab transform data\n# Frame count: 2\n"));
        assert_eq!(parse_ascii(&content), transforms);
    }

    #[tokio::test]
    async fn analyze_missing_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.trf");
        let err = analyze_file(&path).await.unwrap_err();
        assert!(matches!(err, MergeError::MissingInput(p) if p == path));
    }

    #[test]
    fn compare_prefers_the_steadier_file() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let shaky = dir.path().join("shaky.trf");
            let steady = dir.path().join("steady.trf");
            std::fs::write(&shaky, binary_trf(&[(8.0, 6.0, 0.5), (-8.0, 6.0, -0.5)])).unwrap();
            std::fs::write(&steady, b"# export\n0 0.5 0.5 0.01\n1 -0.5 -0.5 -0.01\n").unwrap();

            let comparison = compare_files(&shaky, &steady).await.unwrap();
            assert_eq!(comparison.better, steady);
            assert!(comparison.difference > 0.0);
            assert!(comparison.improvement_pct > 0.0 && comparison.improvement_pct <= 100.0);
        });
    }
}
