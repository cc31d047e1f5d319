//! Deterministic renaming of recorded frame images.
//!
//! Every saved image is renamed to `{user}_f{frame_id}_a{action}_nt{t}.png`
//! where `t` is 0 for a dead character and 1 otherwise. Renaming is two
//! phase: all files are attempted first, and the manifest is rewritten only
//! if none failed, so it never references files that were not created.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::frame::FrameRecord;
use crate::manifest::{FRAMES_DIR, MANIFEST_FILE, ManifestError, RecordingManifest};

/// Descriptor stamped into `recording_info.naming_format`.
pub const NAMING_FORMAT: &str = "user_fxxx_axxx_ntxxx.png";

/// Typed form of a renamed frame's filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameName {
    pub user: String,
    pub frame_id: u64,
    pub action_code: u32,
    /// 0 when the character was dead, 1 otherwise
    pub terminal: u8,
}

impl FrameName {
    pub fn for_record(user: &str, record: &FrameRecord) -> Self {
        Self {
            user: user.to_string(),
            frame_id: record.frame_id,
            action_code: record.action_code.bits(),
            terminal: if record.character_dead { 0 } else { 1 },
        }
    }

    pub fn character_dead(&self) -> bool {
        self.terminal == 0
    }
}

impl std::fmt::Display for FrameName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_f{}_a{}_nt{}.png",
            self.user, self.frame_id, self.action_code, self.terminal
        )
    }
}

/// Error parsing a [`FrameName`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' does not match {NAMING_FORMAT}")]
pub struct ParseFrameNameError(pub String);

impl FromStr for FrameName {
    type Err = ParseFrameNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFrameNameError(s.to_string());

        let stem = s.strip_suffix(".png").ok_or_else(err)?;
        // User names may contain underscores, so split from the right
        let mut parts = stem.rsplitn(4, '_');
        let terminal = parts.next().and_then(|p| p.strip_prefix("nt")).ok_or_else(err)?;
        let action = parts.next().and_then(|p| p.strip_prefix('a')).ok_or_else(err)?;
        let frame = parts.next().and_then(|p| p.strip_prefix('f')).ok_or_else(err)?;
        let user = parts.next().filter(|u| !u.is_empty()).ok_or_else(err)?;

        let terminal: u8 = terminal.parse().map_err(|_| err())?;
        if terminal > 1 {
            return Err(err());
        }
        Ok(Self {
            user: user.to_string(),
            frame_id: frame.parse().map_err(|_| err())?,
            action_code: action.parse().map_err(|_| err())?,
            terminal,
        })
    }
}

/// A frame that could not be renamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFailure {
    pub frame_id: u64,
    pub reason: String,
}

/// Outcome of a rename batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub renamed: usize,
    /// Records without an image
    pub skipped: usize,
    pub failures: Vec<RenameFailure>,
    /// Whether the manifest was rewritten with the new names
    pub manifest_updated: bool,
}

impl RenameReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Error that prevents a rename batch from running or finishing.
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    #[error("invalid user name '{0}': must be non-empty and contain no path separators")]
    InvalidUserName(String),

    #[error("frames directory not found: {}", .0.display())]
    FramesDirMissing(PathBuf),

    #[error("failed to update manifest: {0}")]
    ManifestWrite(#[from] ManifestError),
}

/// Reject user names that would escape the frames directory.
pub fn validate_user_name(user: &str) -> Result<(), RenameError> {
    let invalid = user.is_empty()
        || user == "."
        || user == ".."
        || user.contains(['/', '\\', '\0']);
    if invalid {
        return Err(RenameError::InvalidUserName(user.to_string()));
    }
    Ok(())
}

/// Phase one: rename every saved image in `recording_dir/frames`.
///
/// Never stops early; failures are collected per frame.
pub fn rename_frames(
    user: &str,
    recording_dir: &Path,
    frames: &[FrameRecord],
) -> Result<RenameReport, RenameError> {
    validate_user_name(user)?;
    let frames_dir = recording_dir.join(FRAMES_DIR);
    if !frames_dir.is_dir() {
        return Err(RenameError::FramesDirMissing(frames_dir));
    }

    info!(frames = frames.len(), dir = %frames_dir.display(), "Renaming frames");
    let mut report = RenameReport::default();

    for record in frames {
        let Some(ref old_name) = record.image_filename else {
            report.skipped += 1;
            continue;
        };
        let new_name = FrameName::for_record(user, record).to_string();

        match rename_one(&frames_dir, old_name, &new_name) {
            Ok(()) => report.renamed += 1,
            Err(reason) => {
                warn!(frame_id = record.frame_id, "Rename failed: {}", reason);
                report.failures.push(RenameFailure {
                    frame_id: record.frame_id,
                    reason,
                });
            }
        }
    }

    info!(
        renamed = report.renamed,
        failed = report.failures.len(),
        skipped = report.skipped,
        "Rename finished"
    );
    Ok(report)
}

fn rename_one(frames_dir: &Path, old_name: &str, new_name: &str) -> Result<(), String> {
    if Path::new(old_name).file_name().and_then(|n| n.to_str()) != Some(old_name) {
        return Err(format!("invalid recorded filename: {}", old_name));
    }

    let old_path = frames_dir.join(old_name);
    let new_path = frames_dir.join(new_name);

    if !old_path.is_file() {
        return Err(format!("source file missing: {}", old_name));
    }
    if old_path == new_path {
        debug!(file = old_name, "Frame already has its final name");
        return Ok(());
    }
    if new_path.exists() {
        return Err(format!("target already exists: {}", new_name));
    }
    std::fs::rename(&old_path, &new_path).map_err(|e| e.to_string())
}

/// Point the manifest at the new names and stamp the user.
///
/// Records without an image keep a null filename.
pub fn apply_names(manifest: &mut RecordingManifest, user: &str) {
    for record in &mut manifest.frame_data {
        if record.image_filename.is_some() {
            record.image_filename = Some(FrameName::for_record(user, record).to_string());
        }
    }
    manifest.recording_info.user_name = Some(user.to_string());
    manifest.recording_info.naming_format = Some(NAMING_FORMAT.to_string());
}

/// Rename a recording's images, then persist the manifest on full success.
///
/// `manifest` is only modified when every rename succeeded.
pub fn rename_recording(
    user: &str,
    recording_dir: &Path,
    manifest: &mut RecordingManifest,
) -> Result<RenameReport, RenameError> {
    let mut report = rename_frames(user, recording_dir, &manifest.frame_data)?;
    if !report.is_success() {
        warn!(
            failed = report.failures.len(),
            "Manifest left unchanged because some frames failed to rename"
        );
        return Ok(report);
    }

    apply_names(manifest, user);
    manifest.write_to(&recording_dir.join(MANIFEST_FILE))?;
    report.manifest_updated = true;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_manifest, sample_record};

    fn setup(manifest: &RecordingManifest) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let frames_dir = dir.path().join(FRAMES_DIR);
        std::fs::create_dir(&frames_dir).unwrap();
        for record in &manifest.frame_data {
            if let Some(ref name) = record.image_filename {
                std::fs::write(frames_dir.join(name), name.as_bytes()).unwrap();
            }
        }
        manifest.write_to(&dir.path().join(MANIFEST_FILE)).unwrap();
        dir
    }

    // =============================================================
    // FrameName
    // =============================================================

    #[test]
    fn test_frame_name_format() {
        let alive = sample_record(12, 5, false, Some("frame_000003.png"));
        let dead = sample_record(40, 0, true, None);
        assert_eq!(FrameName::for_record("zf", &alive).to_string(), "zf_f12_a5_nt1.png");
        assert_eq!(FrameName::for_record("zf", &dead).to_string(), "zf_f40_a0_nt0.png");
    }

    #[test]
    fn test_frame_name_is_deterministic() {
        let record = sample_record(7, 20, false, Some("frame_000001.png"));
        let names: Vec<String> = (0..3)
            .map(|_| FrameName::for_record("player_one", &record).to_string())
            .collect();
        assert!(names.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_frame_name_parses_back() {
        let name: FrameName = "player_one_f7_a20_nt0.png".parse().unwrap();
        assert_eq!(
            name,
            FrameName {
                user: "player_one".to_string(),
                frame_id: 7,
                action_code: 20,
                terminal: 0,
            }
        );
        assert!(name.character_dead());
        assert_eq!(name.to_string(), "player_one_f7_a20_nt0.png");
    }

    #[test]
    fn test_frame_name_rejects_malformed() {
        for bad in [
            "frame_000001.png",
            "zf_f1_a2_nt1.jpg",
            "_f1_a2_nt1.png",
            "zf_f1_a2_nt7.png",
            "zf_fx_a2_nt1.png",
        ] {
            assert!(bad.parse::<FrameName>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_user_name_validation() {
        assert!(validate_user_name("zf").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                validate_user_name(bad),
                Err(RenameError::InvalidUserName(_))
            ));
        }
    }

    // =============================================================
    // Rename batches
    // =============================================================

    #[test]
    fn test_rename_recording_success() {
        let mut manifest = sample_manifest(6);
        let dir = setup(&manifest);

        let report = rename_recording("zf", dir.path(), &mut manifest).unwrap();
        assert!(report.is_success());
        assert!(report.manifest_updated);
        assert_eq!(report.renamed, 3);
        assert_eq!(report.skipped, 3);

        let frames_dir = dir.path().join(FRAMES_DIR);
        assert!(frames_dir.join("zf_f0_a0_nt1.png").exists());
        assert!(frames_dir.join("zf_f2_a2_nt1.png").exists());
        assert!(frames_dir.join("zf_f4_a8_nt1.png").exists());
        assert!(!frames_dir.join("frame_000000.png").exists());

        let written = RecordingManifest::read_from(&dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(written, manifest);
        assert_eq!(written.recording_info.user_name.as_deref(), Some("zf"));
        assert_eq!(
            written.recording_info.naming_format.as_deref(),
            Some(NAMING_FORMAT)
        );
        assert_eq!(written.frame_data[1].image_filename, None);
        assert_eq!(
            written.frame_data[2].image_filename.as_deref(),
            Some("zf_f2_a2_nt1.png")
        );
    }

    #[test]
    fn test_missing_source_blocks_manifest_update() {
        let mut manifest = sample_manifest(6);
        let dir = setup(&manifest);
        let manifest_file = dir.path().join(MANIFEST_FILE);
        let before = std::fs::read(&manifest_file).unwrap();
        std::fs::remove_file(dir.path().join(FRAMES_DIR).join("frame_000001.png")).unwrap();

        let original = manifest.clone();
        let report = rename_recording("zf", dir.path(), &mut manifest).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].frame_id, 2);
        assert!(report.failures[0].reason.contains("missing"));
        // Other frames were still attempted
        assert_eq!(report.renamed, 2);
        assert!(!report.manifest_updated);
        assert_eq!(manifest, original);
        assert_eq!(std::fs::read(&manifest_file).unwrap(), before);
    }

    #[test]
    fn test_missing_frames_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest(2);
        assert!(matches!(
            rename_frames("zf", dir.path(), &manifest.frame_data),
            Err(RenameError::FramesDirMissing(_))
        ));
    }

    #[test]
    fn test_existing_target_is_not_overwritten() {
        let manifest = sample_manifest(2);
        let dir = setup(&manifest);
        let frames_dir = dir.path().join(FRAMES_DIR);
        std::fs::write(frames_dir.join("zf_f0_a0_nt1.png"), b"keep").unwrap();

        let report = rename_frames("zf", dir.path(), &manifest.frame_data).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("already exists"));
        assert_eq!(std::fs::read(frames_dir.join("zf_f0_a0_nt1.png")).unwrap(), b"keep");
    }

    #[test]
    fn test_rerun_after_success_is_noop() {
        let mut manifest = sample_manifest(4);
        let dir = setup(&manifest);

        rename_recording("zf", dir.path(), &mut manifest).unwrap();
        let report = rename_recording("zf", dir.path(), &mut manifest).unwrap();
        assert!(report.is_success());
        assert_eq!(report.renamed, 2);
    }

    #[test]
    fn test_recorded_filename_cannot_escape_frames_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(FRAMES_DIR)).unwrap();
        let records = vec![sample_record(0, 1, false, Some("../recording_data.json"))];

        let report = rename_frames("zf", dir.path(), &records).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("invalid recorded filename"));
    }
}
