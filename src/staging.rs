//! Staged filesystem changes and the append-only changelog.
//!
//! Generated artifacts (concept files derived from classification paths)
//! never hit the filesystem directly: they are staged, previewable, and
//! applied in an explicit step. Applies are atomic per file (temp write then
//! rename), isolated per file (one failure never aborts the batch), and
//! recorded in the changelog only after the write lands. A change whose
//! content no longer matches its staged checksum is refused as corruption.
//!
//! Dry-run walks the same code path with every side effect disabled: no
//! writes, no changelog entries, staged changes retained.

use crate::{config::WikiConfig, error::TaxonError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::BTreeMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};
use titlecase::titlecase;

/// Hex-encoded SHA-256 of file content.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Move,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Move => write!(f, "move"),
        }
    }
}

/// One staged filesystem change, relative to the wiki root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub file: String,
    /// Source path for moves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub classification_path: String,
    /// Full file content for creates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogAction {
    Create,
    Modify,
    Delete,
}

/// One durable changelog record. The changelog is append-only; entries are
/// never rewritten or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub action: ChangelogAction,
    pub file: String,
    pub classification_path: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// One per-file apply failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub file: String,
    pub cause: String,
}

/// Result of applying a staged batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<StagedChange>,
    pub failures: Vec<ApplyFailure>,
    pub dry_run: bool,
}

/// Default content for a generated concept file.
fn default_content(classification_path: &str) -> String {
    let (parent, name) = classification_path
        .rsplit_once('/')
        .unwrap_or(("", classification_path));
    let display = name.replace('_', " ");

    let mut content = format!("# {}\n\n", titlecase(&display));
    if !parent.is_empty() {
        content.push_str(&format!("[[{name}]]{{is_a: {parent}}}\n\n"));
    }
    content.push_str("## Definition\n\n");
    content.push_str(&format!("_{display} is a concept._\n\n"));
    content.push_str("## Related\n\n");
    content.push_str("<!-- Add related concepts here -->\n");
    content
}

/// Accumulates staged changes against one wiki root and applies them.
#[derive(Debug)]
pub struct Stager {
    root: PathBuf,
    staged: Vec<StagedChange>,
}

impl Stager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Stager {
            root: root.into(),
            staged: Vec::new(),
        }
    }

    pub fn preview(&self) -> &[StagedChange] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    /// Stage creation of the concept file a classification path maps to.
    /// With no explicit content, a titled skeleton with the derived `is_a`
    /// link is generated.
    pub fn stage_create(
        &mut self,
        config: &WikiConfig,
        classification_path: &str,
        content: Option<String>,
    ) -> &StagedChange {
        let file = config.concept_file(classification_path);
        let content = content.unwrap_or_else(|| default_content(classification_path));
        let checksum = checksum(&content);
        tracing::debug!(%file, %classification_path, "staging create");

        self.staged.push(StagedChange {
            kind: ChangeKind::Create,
            file,
            from: None,
            classification_path: classification_path.to_string(),
            content: Some(content),
            checksum: Some(checksum),
            timestamp: Utc::now().to_rfc3339(),
        });
        self.staged.last().expect("just pushed")
    }

    /// Stage a move of an existing file to its classification-derived
    /// location.
    pub fn stage_move(
        &mut self,
        from: &str,
        to: &str,
        classification_path: &str,
    ) -> &StagedChange {
        tracing::debug!(%from, %to, %classification_path, "staging move");
        self.staged.push(StagedChange {
            kind: ChangeKind::Move,
            file: to.to_string(),
            from: Some(from.to_string()),
            classification_path: classification_path.to_string(),
            content: None,
            checksum: None,
            timestamp: Utc::now().to_rfc3339(),
        });
        self.staged.last().expect("just pushed")
    }

    /// Apply the staged batch. Each change is applied independently; a
    /// failure records the cause and moves on. Successful changes append to
    /// `changelog` after their write completes. A dry run performs every
    /// validation but no writes, appends nothing, and leaves the batch
    /// staged. A real run drains applied changes, keeping only failures
    /// staged.
    pub fn apply(
        &mut self,
        changelog: &mut Vec<ChangelogEntry>,
        dry_run: bool,
    ) -> ApplyReport {
        let mut report = ApplyReport {
            dry_run,
            ..ApplyReport::default()
        };
        let mut remaining = Vec::new();

        for change in self.staged.drain(..) {
            match apply_one(&self.root, &change, changelog, dry_run) {
                Ok(()) => report.applied.push(change),
                Err(err) => {
                    tracing::warn!(file = %change.file, error = %err, "staged change failed");
                    report.failures.push(ApplyFailure {
                        file: change.file.clone(),
                        cause: err.to_string(),
                    });
                    remaining.push(change);
                }
            }
        }

        if dry_run {
            // Side-effect-free: everything stays staged, including changes
            // that validated cleanly.
            remaining = report.applied.clone().into_iter().chain(remaining).collect();
        }
        self.staged = remaining;
        report
    }
}

fn apply_one(
    root: &Path,
    change: &StagedChange,
    changelog: &mut Vec<ChangelogEntry>,
    dry_run: bool,
) -> Result<(), TaxonError> {
    match change.kind {
        ChangeKind::Create => {
            let content = change.content.as_deref().ok_or_else(|| {
                TaxonError::Staging {
                    path: change.file.clone(),
                    cause: "staged create has no content".to_string(),
                }
            })?;
            let expected = change.checksum.as_deref().unwrap_or_default();
            let actual = checksum(content);
            if actual != expected {
                return Err(TaxonError::Corruption(format!(
                    "staged content for '{}' does not match its checksum: expected {expected}, \
                     got {actual}",
                    change.file
                )));
            }
            if dry_run {
                return Ok(());
            }
            write_atomic(&root.join(&change.file), content)?;
            changelog.push(ChangelogEntry {
                action: ChangelogAction::Create,
                file: change.file.clone(),
                classification_path: change.classification_path.clone(),
                timestamp: change.timestamp.clone(),
                checksum: change.checksum.clone(),
            });
        }
        ChangeKind::Move => {
            let from = change.from.as_deref().ok_or_else(|| TaxonError::Staging {
                path: change.file.clone(),
                cause: "staged move has no source path".to_string(),
            })?;
            let source = root.join(from);
            if !source.exists() {
                return Err(TaxonError::NotFound(format!(
                    "cannot move '{from}': file does not exist"
                )));
            }
            if dry_run {
                return Ok(());
            }
            let target = root.join(&change.file);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let moved_checksum = fs::read_to_string(&source).ok().map(|c| checksum(&c));
            fs::rename(&source, &target)?;
            // A move is a create at the new path and a delete at the old one.
            changelog.push(ChangelogEntry {
                action: ChangelogAction::Create,
                file: change.file.clone(),
                classification_path: change.classification_path.clone(),
                timestamp: change.timestamp.clone(),
                checksum: moved_checksum,
            });
            changelog.push(ChangelogEntry {
                action: ChangelogAction::Delete,
                file: from.to_string(),
                classification_path: change.classification_path.clone(),
                timestamp: change.timestamp.clone(),
                checksum: None,
            });
        }
    }
    Ok(())
}

/// Audit applied writes against the changelog: for each file path, the
/// latest non-delete entry's checksum must match the on-disk content, when
/// the file still exists and has not been superseded by a later entry.
/// A mismatch is corruption, never silently repaired.
pub fn verify_changelog(root: &Path, entries: &[ChangelogEntry]) -> Result<(), TaxonError> {
    let mut latest: BTreeMap<&str, &ChangelogEntry> = BTreeMap::new();
    for entry in entries {
        latest.insert(entry.file.as_str(), entry);
    }

    for (file, entry) in latest {
        if entry.action == ChangelogAction::Delete {
            continue;
        }
        let Some(expected) = entry.checksum.as_deref() else {
            continue;
        };
        let path = root.join(file);
        if !path.exists() {
            continue;
        }
        let actual = checksum(&fs::read_to_string(&path)?);
        if actual != expected {
            return Err(TaxonError::Corruption(format!(
                "changelog checksum mismatch for '{file}': expected {expected}, got {actual}"
            )));
        }
    }
    Ok(())
}

/// Write via a sibling temp file then rename, so a crash mid-write never
/// leaves a truncated file at the final path.
fn write_atomic(path: &Path, content: &str) -> Result<(), TaxonError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
