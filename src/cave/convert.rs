//! Migration of legacy `cave.json` rows to the import schema.
//!
//! Legacy rows carry `cave_id`, `contributor_number` and
//! `contributor_name`; import rows are keyed by channel and user. Every
//! contributor is resolved to a channel before the first file is renamed,
//! so an interrupted or refused lookup leaves the media directory alone
//! for all rows after it.

use super::mapping::{ChannelMapping, ChannelResolver, ResolveError};
use super::naming::{basename, iso_utc, legacy_import_filename, split_extension};
use super::reindex::{locate, settle, AttachmentOutcome, Outcome, ReconcileReport};
use super::schema::{is_truthy, value_label, AttachmentKind, Record};
use super::storage::MediaDir;
use crate::error::{CaveError, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, warn};

const DEFAULT_USER_NAME: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertReport {
    pub converted: usize,
    /// Rows dropped for lacking `cave_id` or `contributor_number`.
    pub skipped_rows: usize,
    pub new_users: usize,
    /// The resolver was interrupted; rows from that point on were left out.
    pub interrupted: bool,
    pub files: ReconcileReport,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub records: Vec<Value>,
    pub report: ConvertReport,
}

struct Planned<'a> {
    row: &'a Record,
    cave_id: String,
    user_id: String,
    user_name: String,
    channel_id: String,
}

/// Convert `legacy` rows, renaming their image and video files inside
/// `media`. New users are added to `mapping` through `resolver`.
///
/// `UnknownUser` aborts before any rename; the caller still owns `mapping`
/// and decides whether to persist it.
pub fn convert<R: ChannelResolver>(
    legacy: &[Record],
    media: &MediaDir,
    mapping: &mut ChannelMapping,
    resolver: &mut R,
    now: DateTime<Utc>,
) -> Result<Conversion> {
    let mut report = ConvertReport::default();
    let plan = resolve_channels(legacy, mapping, resolver, &mut report)?;

    let time = iso_utc(now);
    let mut records = Vec::with_capacity(plan.len());
    for item in plan {
        let before = report.files.corrected;
        let elements = convert_elements(&item, media, &mut report.files);
        if report.files.corrected > before {
            report.files.records_updated += 1;
        }

        let mut out = Map::new();
        out.insert("elements".into(), Value::Array(elements));
        out.insert("channelId".into(), Value::String(item.channel_id));
        out.insert(
            "userId".into(),
            item.row.get("contributor_number").cloned().unwrap_or(Value::Null),
        );
        out.insert("userName".into(), Value::String(item.user_name));
        out.insert("status".into(), Value::String("active".into()));
        out.insert("time".into(), Value::String(time.clone()));
        records.push(Value::Object(out));
        report.converted += 1;
    }

    Ok(Conversion { records, report })
}

fn resolve_channels<'a, R: ChannelResolver>(
    legacy: &'a [Record],
    mapping: &mut ChannelMapping,
    resolver: &mut R,
    report: &mut ConvertReport,
) -> Result<Vec<Planned<'a>>> {
    let mut plan = Vec::new();
    for (i, row) in legacy.iter().enumerate() {
        let cave_id = row.get("cave_id");
        let user_id = row.get("contributor_number");
        let (Some(cave_id), Some(user_id)) = (
            cave_id.filter(|v| is_truthy(Some(*v))).and_then(value_label),
            user_id.filter(|v| is_truthy(Some(*v))).and_then(value_label),
        ) else {
            warn!("skipping row #{}: missing cave_id or contributor_number", i + 1);
            report.skipped_rows += 1;
            continue;
        };
        let user_name = row
            .get("contributor_name")
            .and_then(value_label)
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());

        let channel_id = match mapping.get(&user_id) {
            Some(channel) => channel,
            None => match resolver.resolve(&user_id, &user_name) {
                Ok(channel) => {
                    mapping.insert(&user_id, &channel);
                    report.new_users += 1;
                    info!("mapped user {user_id} ({user_name}) to channel {channel}");
                    channel
                }
                Err(ResolveError::Interrupted) => {
                    warn!("interrupted at row #{}, keeping what was resolved so far", i + 1);
                    report.interrupted = true;
                    break;
                }
                Err(ResolveError::Unknown(user)) => return Err(CaveError::UnknownUser(user)),
            },
        };

        plan.push(Planned {
            row,
            cave_id,
            user_id,
            user_name,
            channel_id,
        });
    }
    Ok(plan)
}

fn convert_elements(item: &Planned<'_>, media: &MediaDir, files: &mut ReconcileReport) -> Vec<Value> {
    let mut index = 0;
    let mut elements = Vec::with_capacity(item.row.attachments().len());
    for (position, attachment) in item.row.attachments().iter().enumerate() {
        let mut attachment = attachment.clone();
        let original = attachment
            .file()
            .filter(|f| !f.is_empty())
            .map(str::to_owned);

        if let (Some(AttachmentKind::Image | AttachmentKind::Video), Some(original)) =
            (attachment.kind(), original)
        {
            index += 1;
            let (_, extension) = split_extension(&original);
            let target = legacy_import_filename(
                &item.cave_id,
                index,
                &item.channel_id,
                &item.user_id,
                extension,
            );
            let current = basename(&original);
            let outcome = match locate(media, current) {
                Ok(()) => settle(media, current, target.clone()),
                Err(outcome) => outcome,
            };
            // The file already carries the import name even when the
            // stored value still has a directory prefix.
            if matches!(outcome, Outcome::Corrected { .. } | Outcome::Unchanged) {
                attachment.set_file(target);
            }
            files.push(AttachmentOutcome {
                record: item.cave_id.clone(),
                position,
                file: original,
                outcome,
            });
        }
        elements.push(Value::Object(attachment.into_fields()));
    }
    elements
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn legacy(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    fn answer_with(channel: &'static str) -> impl FnMut(&str, &str) -> std::result::Result<String, ResolveError> {
        move |_: &str, _: &str| Ok(channel.to_string())
    }

    #[test]
    fn converts_row_and_renames_media() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("cat.png"), b"img").unwrap();
        fs::write(tmp.path().join("dog.mp4"), b"vid").unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        let rows = legacy(json!([{
            "cave_id": 12,
            "contributor_number": "777",
            "contributor_name": "洞主",
            "elements": [
                {"type": "text", "content": "hello"},
                {"type": "image", "file": "resources/cat.png"},
                {"type": "video", "file": "dog.mp4"},
                {"type": "audio", "file": "song.mp3"}
            ]
        }]));
        let mut mapping = ChannelMapping::default();
        let mut resolver = answer_with("chan");

        let out = convert(&rows, &media, &mut mapping, &mut resolver, now()).unwrap();

        assert_eq!(out.report.converted, 1);
        assert_eq!(out.report.new_users, 1);
        assert_eq!(out.report.files.corrected, 2);
        assert_eq!(mapping.get("777").as_deref(), Some("chan"));
        assert_eq!(
            out.records[0],
            json!({
                "elements": [
                    {"type": "text", "content": "hello"},
                    {"type": "image", "file": "12_1_chan_777.png"},
                    {"type": "video", "file": "12_2_chan_777.mp4"},
                    {"type": "audio", "file": "song.mp3"}
                ],
                "channelId": "chan",
                "userId": "777",
                "userName": "洞主",
                "status": "active",
                "time": "2024-01-02T03:04:05.000000Z"
            })
        );
        assert!(tmp.path().join("12_1_chan_777.png").exists());
        assert!(tmp.path().join("12_2_chan_777.mp4").exists());
    }

    #[test]
    fn known_users_skip_the_resolver_and_bad_rows_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        let rows = legacy(json!([
            {"cave_id": 1, "contributor_number": "u1", "elements": []},
            {"cave_id": 0, "contributor_number": "u1"},
            {"contributor_number": "u1"},
            {"cave_id": 2, "contributor_number": "u1"}
        ]));
        let mut mapping = ChannelMapping::default();
        mapping.insert("u1", "c1");
        let mut resolver = |_: &str, _: &str| -> std::result::Result<String, ResolveError> {
            panic!("mapping already knows u1")
        };

        let out = convert(&rows, &media, &mut mapping, &mut resolver, now()).unwrap();

        assert_eq!(out.report.converted, 2);
        assert_eq!(out.report.skipped_rows, 2);
        assert_eq!(out.records[0]["userName"], "Unknown");
        assert_eq!(out.records[1]["channelId"], "c1");
    }

    #[test]
    fn missing_media_keeps_original_name() {
        let tmp = TempDir::new().unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        let rows = legacy(json!([{
            "cave_id": 3, "contributor_number": 5,
            "elements": [{"type": "image", "file": "lost.jpg"}]
        }]));
        let mut mapping = ChannelMapping::default();
        let mut resolver = answer_with("c");

        let out = convert(&rows, &media, &mut mapping, &mut resolver, now()).unwrap();

        assert_eq!(out.report.files.missing, 1);
        assert_eq!(out.records[0]["elements"][0]["file"], "lost.jpg");
        assert_eq!(out.records[0]["userId"], 5);
    }

    #[test]
    fn interruption_keeps_resolved_prefix() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.png"), b"b").unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        let rows = legacy(json!([
            {"cave_id": 1, "contributor_number": "a"},
            {"cave_id": 2, "contributor_number": "b",
             "elements": [{"type": "image", "file": "b.png"}]},
            {"cave_id": 3, "contributor_number": "a"}
        ]));
        let mut mapping = ChannelMapping::default();
        let mut resolver = |user: &str, _: &str| -> std::result::Result<String, ResolveError> {
            if user == "a" {
                Ok("ca".into())
            } else {
                Err(ResolveError::Interrupted)
            }
        };

        let out = convert(&rows, &media, &mut mapping, &mut resolver, now()).unwrap();

        assert!(out.report.interrupted);
        assert_eq!(out.report.converted, 1);
        assert_eq!(mapping.len(), 1);
        assert!(tmp.path().join("b.png").exists());
    }

    #[test]
    fn strict_resolution_fails_before_renaming() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.png"), b"a").unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        let rows = legacy(json!([
            {"cave_id": 1, "contributor_number": "known",
             "elements": [{"type": "image", "file": "a.png"}]},
            {"cave_id": 2, "contributor_number": "stranger"}
        ]));
        let mut mapping = ChannelMapping::default();
        mapping.insert("known", "k");

        let err = convert(
            &rows,
            &media,
            &mut mapping,
            &mut crate::cave::mapping::StrictResolver,
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, CaveError::UnknownUser(ref u) if u == "stranger"));
        assert!(tmp.path().join("a.png").exists());
    }
}
