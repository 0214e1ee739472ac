use super::convert::{convert, ConvertReport};
use super::detect::ContentDetector;
use super::index::{load_records, write_document};
use super::mapping::{ChannelMapping, ChannelResolver};
use super::reindex::{ExtensionSource, Mode, ReconcileReport, Reindexer};
use super::storage::MediaDir;
use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::info;

/// Correct file extensions from content and rewrite the document if
/// anything changed.
pub fn fix_extensions<D: ContentDetector>(config: &Config, detector: D) -> Result<ReconcileReport> {
    reconcile_document(config, detector, Mode::FixExtension)
}

/// Rename every media file to its canonical name.
pub fn reindex<D: ContentDetector>(
    config: &Config,
    detector: D,
    extension: ExtensionSource,
) -> Result<ReconcileReport> {
    reconcile_document(config, detector, Mode::Canonical(extension))
}

fn reconcile_document<D: ContentDetector>(
    config: &Config,
    detector: D,
    mode: Mode,
) -> Result<ReconcileReport> {
    let media = MediaDir::open(&config.media_dir)?;
    let mut records = load_records(&config.input_path)?;
    info!(
        media = %media.base_dir().display(),
        "checking {} records in {:?} mode",
        records.len(),
        mode
    );

    let report = Reindexer::new(&media, detector, mode).reconcile(&mut records)?;

    if report.has_corrections() {
        write_document(&config.output_path, &records, config.json_indent)?;
        info!(path = %config.output_path.display(), "document updated");
    } else {
        info!("no corrections, document left as is");
    }
    Ok(report)
}

/// Convert a legacy document. The mapping is saved even when conversion
/// stops early or fails on an unknown user.
pub fn convert_legacy<R: ChannelResolver>(
    config: &Config,
    resolver: &mut R,
    now: DateTime<Utc>,
) -> Result<ConvertReport> {
    let media = MediaDir::open(&config.media_dir)?;
    let legacy = load_records(&config.input_path)?;
    let mut mapping = ChannelMapping::load(&config.mapping_path);

    let result = convert(&legacy, &media, &mut mapping, resolver, now);
    mapping.save(&config.mapping_path, config.json_indent)?;
    let conversion = result?;

    write_document(&config.output_path, &conversion.records, config.json_indent)?;
    info!(
        path = %config.output_path.display(),
        "wrote {} converted records",
        conversion.records.len()
    );
    Ok(conversion.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cave::mapping::{ResolveError, StrictResolver};
    use crate::error::CaveError;
    use serde_json::{json, Value};
    use std::fs;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        Config {
            input_path: dir.join("in.json"),
            output_path: dir.join("out.json"),
            media_dir: dir.join("media"),
            mapping_path: dir.join("mapping.json"),
            json_indent: 2,
        }
    }

    fn never(_: &Path) -> io::Result<Option<String>> {
        Ok(None)
    }

    #[test]
    fn reindex_writes_only_after_corrections() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        fs::create_dir(&config.media_dir).unwrap();
        fs::write(
            &config.input_path,
            json!([{"id": 1, "time": "2023-01-01T00:00:00Z", "elements": [{"type": "image", "file": "gone.png"}]}])
                .to_string(),
        )
        .unwrap();

        let report = reindex(&config, never, ExtensionSource::Existing).unwrap();
        assert_eq!(report.missing, 1);
        assert!(!config.output_path.exists());
    }

    #[test]
    fn missing_media_dir_aborts_before_loading() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let err = fix_extensions(&config, never).unwrap_err();
        assert!(matches!(err, CaveError::MissingPath(p) if p == config.media_dir));
    }

    #[test]
    fn convert_saves_mapping_even_on_unknown_user() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        fs::create_dir(&config.media_dir).unwrap();
        fs::write(&config.mapping_path, r#"{"a": "ca"}"#).unwrap();
        fs::write(
            &config.input_path,
            json!([
                {"cave_id": 1, "contributor_number": "a"},
                {"cave_id": 2, "contributor_number": "b"}
            ])
            .to_string(),
        )
        .unwrap();

        let err = convert_legacy(&config, &mut StrictResolver, Utc::now()).unwrap_err();
        assert!(matches!(err, CaveError::UnknownUser(_)));
        assert!(config.mapping_path.exists());
        assert!(!config.output_path.exists());
    }

    #[test]
    fn convert_interrupted_persists_progress() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        fs::create_dir(&config.media_dir).unwrap();
        fs::write(
            &config.input_path,
            json!([
                {"cave_id": 1, "contributor_number": "a"},
                {"cave_id": 2, "contributor_number": "b"}
            ])
            .to_string(),
        )
        .unwrap();
        let mut resolver = |user: &str, _: &str| -> std::result::Result<String, ResolveError> {
            match user {
                "a" => Ok("ca".into()),
                _ => Err(ResolveError::Interrupted),
            }
        };

        let report = convert_legacy(&config, &mut resolver, Utc::now()).unwrap();
        assert!(report.interrupted);

        let mapping: Value =
            serde_json::from_str(&fs::read_to_string(&config.mapping_path).unwrap()).unwrap();
        assert_eq!(mapping, json!({"a": "ca"}));
        let out: Value =
            serde_json::from_str(&fs::read_to_string(&config.output_path).unwrap()).unwrap();
        assert_eq!(out.as_array().map(Vec::len), Some(1));
    }
}
