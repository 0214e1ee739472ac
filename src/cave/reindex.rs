//! Batch reconciliation of attachment filenames against the media directory.
//!
//! Every attachment ends in exactly one terminal [`Outcome`]. Only a
//! successful rename touches the in-memory filename, so whatever the
//! outcome mix, the document stays consistent with the files on disk.

use super::detect::{dotted, ContentDetector};
use super::naming::{canonical_filename, iso_to_epoch_ms, split_extension};
use super::schema::Record;
use super::storage::MediaDir;
use crate::error::{CaveError, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Where the extension of a canonical filename comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionSource {
    /// Keep whatever extension the file already has.
    #[default]
    Existing,
    /// Sniff the content and use the extension it calls for.
    Detected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keep the stem, replace a wrong extension.
    FixExtension,
    /// Rename to `{id}-{n}_{channel}-{user}_{ms}{ext}`.
    Canonical(ExtensionSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Corrected { to: String },
    Unchanged,
    Missing,
    Undetectable,
    Error(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Corrected { .. } => "corrected",
            Self::Unchanged => "unchanged",
            Self::Missing => "skipped:missing",
            Self::Undetectable => "skipped:undetectable",
            Self::Error(_) => "skipped:error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOutcome {
    /// Record id, or `#n` (1-based position) for records without one.
    pub record: String,
    /// Position of the attachment inside its record.
    pub position: usize,
    pub file: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub corrected: usize,
    pub unchanged: usize,
    pub missing: usize,
    pub undetectable: usize,
    pub errors: usize,
    /// Records with at least one corrected attachment.
    pub records_updated: usize,
    pub outcomes: Vec<AttachmentOutcome>,
}

impl ReconcileReport {
    pub fn skipped(&self) -> usize {
        self.missing + self.undetectable + self.errors
    }

    pub fn has_corrections(&self) -> bool {
        self.corrected > 0
    }

    /// Attachments that could not be reconciled.
    pub fn unreconciled(&self) -> impl Iterator<Item = &AttachmentOutcome> {
        self.outcomes.iter().filter(|o| {
            !matches!(o.outcome, Outcome::Corrected { .. } | Outcome::Unchanged)
        })
    }

    pub(crate) fn push(&mut self, entry: AttachmentOutcome) {
        match &entry.outcome {
            Outcome::Corrected { to } => {
                info!(record = %entry.record, "'{}' -> '{}'", entry.file, to);
                self.corrected += 1;
            }
            Outcome::Unchanged => {
                debug!(record = %entry.record, "already correct: {}", entry.file);
                self.unchanged += 1;
            }
            Outcome::Missing => {
                warn!(record = %entry.record, "skipped, file not found: {}", entry.file);
                self.missing += 1;
            }
            Outcome::Undetectable => {
                warn!(record = %entry.record, "skipped, unknown file type: {}", entry.file);
                self.undetectable += 1;
            }
            Outcome::Error(reason) => {
                warn!(record = %entry.record, "skipped, error on {}: {}", entry.file, reason);
                self.errors += 1;
            }
        }
        self.outcomes.push(entry);
    }
}

/// Check that `current` is a file inside the media directory.
///
/// Names that would reach outside it are errors, not missing files.
pub(crate) fn locate(media: &MediaDir, current: &str) -> std::result::Result<(), Outcome> {
    match media.exists(current) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Outcome::Missing),
        Err(e) => Err(Outcome::Error(e.to_string())),
    }
}

/// Rename `current` to `target` unless they already match.
pub(crate) fn settle(media: &MediaDir, current: &str, target: String) -> Outcome {
    if target == current {
        return Outcome::Unchanged;
    }
    match media.rename(current, &target) {
        Ok(()) => Outcome::Corrected { to: target },
        Err(e) => Outcome::Error(e.to_string()),
    }
}

/// Identity fields of a record that feed its canonical filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordKey {
    id: String,
    channel: String,
    user: String,
    timestamp_ms: i64,
}

/// Validate every record up front so that a bad document fails before the
/// first rename.
fn record_keys(records: &[Record]) -> Result<Vec<RecordKey>> {
    let mut seen = HashSet::new();
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let id = record.id().ok_or_else(|| {
                CaveError::MalformedDocument(format!("record #{} has no id", i + 1))
            })?;
            let time = record.time().ok_or_else(|| {
                CaveError::MalformedDocument(format!("record {id} has no time"))
            })?;
            let timestamp_ms = iso_to_epoch_ms(time).ok_or_else(|| {
                CaveError::MalformedDocument(format!("record {id} has unparsable time '{time}'"))
            })?;
            if !seen.insert(id.clone()) {
                return Err(CaveError::MalformedDocument(format!("duplicate record id {id}")));
            }
            Ok(RecordKey {
                channel: record.channel_id(),
                user: record.user_id(),
                id,
                timestamp_ms,
            })
        })
        .collect()
}

pub struct Reindexer<'a, D> {
    media: &'a MediaDir,
    detector: D,
    mode: Mode,
}

impl<'a, D: ContentDetector> Reindexer<'a, D> {
    pub fn new(media: &'a MediaDir, detector: D, mode: Mode) -> Self {
        Self {
            media,
            detector,
            mode,
        }
    }

    /// Reconcile every attachment of `records` in place.
    ///
    /// Fails only if the document itself is unusable for the active mode;
    /// per-attachment problems end up in the report.
    pub fn reconcile(&self, records: &mut [Record]) -> Result<ReconcileReport> {
        let keys = match self.mode {
            Mode::Canonical(_) => Some(record_keys(records)?),
            Mode::FixExtension => None,
        };

        let mut report = ReconcileReport::default();
        for (i, record) in records.iter_mut().enumerate() {
            let label = record.id().unwrap_or_else(|| format!("#{}", i + 1));
            let before = report.corrected;
            let mut index = 0;

            for (position, attachment) in record.attachments_mut().iter_mut().enumerate() {
                let Some(current) = attachment.file().map(str::to_owned) else {
                    continue;
                };
                let outcome = match (&keys, self.mode) {
                    (Some(keys), Mode::Canonical(source)) => {
                        if attachment.kind().is_none() {
                            continue;
                        }
                        index += 1;
                        self.canonical(&keys[i], index, &current, source)
                    }
                    _ => self.fix_extension(&current),
                };
                if let Outcome::Corrected { to } = &outcome {
                    attachment.set_file(to.clone());
                }
                report.push(AttachmentOutcome {
                    record: label.clone(),
                    position,
                    file: current,
                    outcome,
                });
            }

            if report.corrected > before {
                report.records_updated += 1;
            }
        }
        Ok(report)
    }

    fn canonical(
        &self,
        key: &RecordKey,
        index: usize,
        current: &str,
        source: ExtensionSource,
    ) -> Outcome {
        if let Err(outcome) = locate(self.media, current) {
            return outcome;
        }
        let extension = match source {
            ExtensionSource::Existing => split_extension(current).1.to_string(),
            ExtensionSource::Detected => match self.sniff(current) {
                Ok(ext) => ext,
                Err(outcome) => return outcome,
            },
        };
        let target = canonical_filename(
            &key.id,
            index,
            &key.channel,
            &key.user,
            key.timestamp_ms,
            &extension,
        );
        settle(self.media, current, target)
    }

    fn fix_extension(&self, current: &str) -> Outcome {
        if let Err(outcome) = locate(self.media, current) {
            return outcome;
        }
        let correct = match self.sniff(current) {
            Ok(ext) => ext,
            Err(outcome) => return outcome,
        };
        let (stem, extension) = split_extension(current);
        if extension.to_lowercase() == correct {
            return Outcome::Unchanged;
        }
        settle(self.media, current, format!("{stem}{correct}"))
    }

    /// Dotted, lower-case extension for the file's content.
    fn sniff(&self, name: &str) -> std::result::Result<String, Outcome> {
        let path = self
            .media
            .absolute_path(name)
            .map_err(|e| Outcome::Error(e.to_string()))?;
        match self.detector.detect(&path) {
            Ok(Some(ext)) => Ok(dotted(&ext)),
            Ok(None) => Err(Outcome::Undetectable),
            Err(e) => Err(Outcome::Error(e.to_string())),
        }
    }
}
