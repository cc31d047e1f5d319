//! Manifest loading with recovery for damaged files.
//!
//! The game can be killed while `recording_data.json` is being written, so
//! a manifest may end mid-object. Loading tries, in order:
//!
//! 1. **Strict parse** of the file as-is.
//! 2. **Repair by truncation**: cut the text back to the last complete frame
//!    object, close the `frame_data` array and the outer object, re-parse.
//!    On success the repaired manifest replaces the file.
//! 3. **Structural scan**: extract every balanced `{...}` inside
//!    `frame_data` and parse each one independently, skipping any that fail.
//!    The header is synthesized and marked as recovered.
//!
//! Before either fallback runs, the original bytes are copied to a backup
//! next to the manifest. [`load_read_only`] runs the same tiers without
//! touching the disk. Only when every tier fails is an error returned,
//! carrying each tier's failure reason.
//!
//! # Known limitation
//!
//! Both fallbacks count brace characters without tracking JSON string
//! literals. A frame whose string values contain `{` or `}` can shift the
//! detected object boundaries; such frames may be lost or make the repair
//! tier fail over to the scan tier.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::frame::FrameRecord;
use crate::manifest::{MANIFEST_FILE, RecordingManifest, RecoveryTier};

const FRAME_DATA_KEY: &str = "\"frame_data\"";

/// A manifest plus how it was obtained.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: RecordingManifest,
    pub tier: RecoveryTier,
    /// Copy of the original bytes, written before any fallback ran
    pub backup: Option<PathBuf>,
}

impl LoadedManifest {
    pub fn is_recovered(&self) -> bool {
        self.tier != RecoveryTier::Strict
    }
}

/// Error loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "no frame data could be recovered from {}\n  strict parse: {strict}\n  repair by truncation: {truncation}\n  structural frame scan: {scan}",
        path.display()
    )]
    Unrecoverable {
        path: PathBuf,
        strict: String,
        truncation: String,
        scan: String,
    },
}

/// Path of the manifest inside a recording directory.
pub fn manifest_path(recording_dir: &Path) -> PathBuf {
    recording_dir.join(MANIFEST_FILE)
}

/// Load the manifest of a recording directory, recovering if needed.
///
/// A damaged file is backed up, and a manifest repaired by truncation
/// replaces it on disk.
pub fn load(recording_dir: &Path) -> Result<LoadedManifest, RecoveryError> {
    load_with(recording_dir, true)
}

/// Like [`load`], but never writes a backup or a repaired file.
pub fn load_read_only(recording_dir: &Path) -> Result<LoadedManifest, RecoveryError> {
    load_with(recording_dir, false)
}

fn load_with(recording_dir: &Path, persist: bool) -> Result<LoadedManifest, RecoveryError> {
    let path = manifest_path(recording_dir);
    if !path.is_file() {
        return Err(RecoveryError::NotFound(path));
    }

    let bytes = std::fs::read(&path).map_err(|source| RecoveryError::Io {
        path: path.clone(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);

    let strict_err = match RecordingManifest::from_json(&content) {
        Ok(manifest) => {
            return Ok(LoadedManifest {
                manifest,
                tier: RecoveryTier::Strict,
                backup: None,
            });
        }
        Err(e) => e,
    };
    warn!(
        path = %path.display(),
        "Manifest is not valid JSON ({}), attempting recovery",
        strict_err
    );

    let backup = if persist {
        match write_backup(&path, &bytes) {
            Ok(backup) => {
                info!(backup = %backup.display(), "Original manifest backed up");
                Some(backup)
            }
            Err(e) => {
                warn!("Failed to back up manifest, repaired file will not be written: {}", e);
                None
            }
        }
    } else {
        None
    };

    let truncation_err = match repair_manifest(&content) {
        Ok(mut manifest) => {
            manifest.recording_info.recovered_by = Some(RecoveryTier::RepairByTruncation);
            info!(
                frames = manifest.frame_data.len(),
                "Recovered manifest by truncation"
            );
            if backup.is_some() {
                if let Err(e) = manifest.write_to(&path) {
                    warn!("Failed to write repaired manifest: {}", e);
                }
            }
            return Ok(LoadedManifest {
                manifest,
                tier: RecoveryTier::RepairByTruncation,
                backup,
            });
        }
        Err(reason) => {
            warn!("Repair by truncation failed: {}", reason);
            reason
        }
    };

    match scan_frames(&content) {
        Ok(frames) => {
            info!(frames = frames.len(), "Recovered frames by structural scan");
            Ok(LoadedManifest {
                manifest: RecordingManifest::recovered(frames, RecoveryTier::StructuralScan),
                tier: RecoveryTier::StructuralScan,
                backup,
            })
        }
        Err(scan_err) => Err(RecoveryError::Unrecoverable {
            path,
            strict: strict_err.to_string(),
            truncation: truncation_err,
            scan: scan_err,
        }),
    }
}

/// Tier 2: truncate and re-parse.
fn repair_manifest(content: &str) -> Result<RecordingManifest, String> {
    let repaired = repair_by_truncation(content)?;
    let manifest =
        RecordingManifest::from_json(&repaired).map_err(|e| format!("re-parse failed: {}", e))?;
    if manifest.frame_data.is_empty() {
        return Err("repaired manifest has no frames".to_string());
    }
    Ok(manifest)
}

/// Cut manifest text back to its last complete frame object and re-close it.
///
/// Brace balance is tracked line by line from the line after the
/// `"frame_data"` key. A line where the balance returns to zero ends a
/// frame object. Scanning stops at the first dangling close (balance below
/// zero) or at end of input; everything after the last complete frame is
/// dropped and `]` / `}` are appended.
pub fn repair_by_truncation(content: &str) -> Result<String, String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let start = lines
        .iter()
        .position(|line| line.contains(FRAME_DATA_KEY))
        .ok_or_else(|| "no frame_data array found".to_string())?;

    let mut balance: i64 = 0;
    let mut last_complete = None;

    for (index, line) in lines.iter().enumerate().skip(start + 1) {
        let opens = line.matches('{').count() as i64;
        let closes = line.matches('}').count() as i64;
        balance += opens - closes;

        if balance < 0 {
            break;
        }
        if balance == 0 && closes > 0 {
            last_complete = Some(index);
        }
    }

    let end = last_complete.ok_or_else(|| "no complete frame object found".to_string())?;

    let mut repaired = lines[..=end].join("\n");
    let trimmed_len = repaired.trim_end().trim_end_matches(',').len();
    repaired.truncate(trimmed_len);
    repaired.push_str("\n  ]\n}\n");
    Ok(repaired)
}

/// Tier 3: extract balanced frame objects one by one.
///
/// Objects that fail to parse are skipped; a missing `frame_filename`
/// defaults to `null`.
pub fn scan_frames(content: &str) -> Result<Vec<FrameRecord>, String> {
    let key = content
        .find(FRAME_DATA_KEY)
        .ok_or_else(|| "no frame_data array found".to_string())?;
    let open = content[key..]
        .find('[')
        .map(|offset| key + offset + 1)
        .ok_or_else(|| "frame_data array has no opening bracket".to_string())?;

    let mut frames = Vec::new();
    let mut skipped = 0usize;
    let mut depth: i64 = 0;
    let mut object_start = None;

    for (offset, c) in content[open..].char_indices() {
        let at = open + offset;
        match c {
            '{' => {
                if depth == 0 {
                    object_start = Some(at);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
                if depth == 0 {
                    if let Some(begin) = object_start.take() {
                        match serde_json::from_str::<FrameRecord>(&content[begin..=at]) {
                            Ok(frame) => frames.push(frame),
                            Err(_) => skipped += 1,
                        }
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed frame objects during scan");
    }
    if frames.is_empty() {
        return Err(format!(
            "no complete frame object could be parsed ({} malformed)",
            skipped
        ));
    }
    Ok(frames)
}

/// Copy the original manifest bytes next to it.
///
/// Uses `<manifest>.backup`, or `.backup.N` when an earlier backup with
/// different content exists. An identical backup is reused.
fn write_backup(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| MANIFEST_FILE.to_string());
    let base = format!("{}.backup", file_name);

    let mut candidate = path.with_file_name(&base);
    let mut n = 1;
    loop {
        if !candidate.exists() {
            std::fs::write(&candidate, bytes)?;
            return Ok(candidate);
        }
        if std::fs::read(&candidate)? == bytes {
            return Ok(candidate);
        }
        candidate = path.with_file_name(format!("{}.{}", base, n));
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_manifest;

    fn write_manifest_text(dir: &Path, text: &str) {
        std::fs::write(manifest_path(dir), text).unwrap();
    }

    fn pretty(frames: u64) -> String {
        serde_json::to_string_pretty(&sample_manifest(frames)).unwrap()
    }

    // =============================================================
    // Strict tier
    // =============================================================

    #[test]
    fn test_missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path()), Err(RecoveryError::NotFound(_))));
    }

    #[test]
    fn test_strict_load_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest(5);
        manifest.write_to(&manifest_path(dir.path())).unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.tier, RecoveryTier::Strict);
        assert!(!loaded.is_recovered());
        assert_eq!(loaded.manifest, manifest);
        assert!(loaded.backup.is_none());
    }

    // =============================================================
    // Repair by truncation
    // =============================================================

    #[test]
    fn test_truncated_mid_object_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let full = pretty(4);
        // Cut inside the last frame object
        let cut = full.rfind("\"mario_dead\"").unwrap();
        write_manifest_text(dir.path(), &full[..cut]);

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.tier, RecoveryTier::RepairByTruncation);
        assert_eq!(loaded.manifest.frame_data.len(), 3);
        assert_eq!(
            loaded.manifest.recording_info.recovered_by,
            Some(RecoveryTier::RepairByTruncation)
        );
        assert_eq!(
            loaded.manifest.frame_data.as_slice(),
            &sample_manifest(4).frame_data[..3]
        );

        // Original bytes preserved, repaired file now parses strictly
        let backup = loaded.backup.unwrap();
        assert_eq!(std::fs::read_to_string(backup).unwrap(), &full[..cut]);
        let reloaded = load(dir.path()).unwrap();
        assert_eq!(reloaded.tier, RecoveryTier::Strict);
        assert_eq!(reloaded.manifest.frame_data.len(), 3);
    }

    #[test]
    fn test_repair_stops_at_dangling_close() {
        let full = pretty(2);
        // A stray close after the first frame
        let first_end = full.find("\n    },").unwrap() + "\n    },".len();
        let damaged = format!("{}\n  }}\n  garbage", &full[..first_end]);

        let repaired = repair_by_truncation(&damaged).unwrap();
        let manifest = RecordingManifest::from_json(&repaired).unwrap();
        assert_eq!(manifest.frame_data.len(), 1);
    }

    #[test]
    fn test_repair_requires_a_complete_frame() {
        let full = pretty(2);
        let cut = full.find("\"frame_id\"").unwrap();
        assert!(repair_by_truncation(&full[..cut]).is_err());
    }

    // =============================================================
    // Structural scan
    // =============================================================

    #[test]
    fn test_compact_truncated_manifest_uses_scan() {
        let dir = tempfile::tempdir().unwrap();
        let compact = serde_json::to_string(&sample_manifest(3)).unwrap();
        let cut = compact.rfind("\"action_binary\"").unwrap();
        write_manifest_text(dir.path(), &compact[..cut]);

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.tier, RecoveryTier::StructuralScan);
        assert_eq!(loaded.manifest.frame_data.len(), 2);

        let info = &loaded.manifest.recording_info;
        assert_eq!(info.total_frames, 2);
        assert_eq!(info.duration, None);
        assert_eq!(info.recording_time, "unknown");
        assert_eq!(info.recovered_by, Some(RecoveryTier::StructuralScan));
        assert!(loaded.backup.is_some());
    }

    #[test]
    fn test_scan_skips_malformed_objects_and_defaults_filename() {
        let text = r#"{"recording_info": {"total_frames": 3,
            "frame_data": [
                {"frame_id": 0, "timestamp": 0.0, "action_code": 1, "action_binary": "0b1",
                 "action_names": ["LEFT"], "mario_state": "small", "mario_dead": false,
                 "frame_saved": true, "frame_filename": "frame_000000.png"},
                {"frame_id": 1, "timestamp": oops},
                {"frame_id": 2, "timestamp": 0.1, "action_code": 4, "action_binary": "0b100",
                 "action_names": ["JUMP"], "mario_state": "small", "mario_dead": true,
                 "frame_saved": false}
            ]"#;

        let frames = scan_frames(text).unwrap();
        let ids: Vec<u64> = frames.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(frames[1].image_filename, None);
        assert!(frames[1].character_dead);
    }

    #[test]
    fn test_scan_stops_at_array_end() {
        let mut text = serde_json::to_string(&sample_manifest(2)).unwrap();
        text.push_str("garbage {\"frame_id\": 9}");
        assert_eq!(scan_frames(&text).unwrap().len(), 2);
    }

    // =============================================================
    // Total failure and backups
    // =============================================================

    #[test]
    fn test_unrecoverable_reports_every_tier() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest_text(dir.path(), "{\"recording_info\": {\"total_frames\": 1");

        let err = load(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, RecoveryError::Unrecoverable { .. }));
        assert!(message.contains("strict parse"));
        assert!(message.contains("repair by truncation"));
        assert!(message.contains("structural frame scan"));
        assert!(message.contains("no frame_data array"));
    }

    #[test]
    fn test_backup_never_clobbers_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest_path(dir.path());

        let first = write_backup(&path, b"first").unwrap();
        let again = write_backup(&path, b"first").unwrap();
        let second = write_backup(&path, b"second").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
        assert!(second.to_string_lossy().ends_with(".backup.1"));
    }

    #[test]
    fn test_read_only_load_leaves_damaged_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let full = pretty(4);
        let cut = full.rfind("\"mario_dead\"").unwrap();
        write_manifest_text(dir.path(), &full[..cut]);

        let loaded = load_read_only(dir.path()).unwrap();
        assert_eq!(loaded.tier, RecoveryTier::RepairByTruncation);
        assert_eq!(loaded.manifest.frame_data.len(), 3);
        assert!(loaded.backup.is_none());

        assert_eq!(
            std::fs::read_to_string(manifest_path(dir.path())).unwrap(),
            &full[..cut]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
