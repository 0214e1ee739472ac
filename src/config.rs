use crate::error::{CaveError, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "cavekit.toml";

/// Which batch job a [`Config`] is resolved for. Each job has its own
/// default file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    FixExtension,
    Reindex,
    Convert,
}

/// Paths and output settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub media_dir: PathBuf,
    pub mapping_path: PathBuf,
    /// Spaces per indentation level in written documents.
    pub json_indent: usize,
}

impl Config {
    pub fn defaults_for(task: Task) -> Self {
        let (input, output, media, indent) = match task {
            Task::FixExtension => ("cave_export.json", "cave_export.json", "cave", 2),
            Task::Reindex => ("cave_export.json", "cave_export_updated.json", "cave", 4),
            Task::Convert => ("cave.json", "cave_import.json", "resources", 2),
        };
        Self {
            input_path: input.into(),
            output_path: output.into(),
            media_dir: media.into(),
            mapping_path: "channel_mapping.json".into(),
            json_indent: indent,
        }
    }

    /// Lay `overrides` over this config. Unset fields keep their value.
    pub fn merge(mut self, overrides: &PathOverrides) -> Self {
        if let Some(p) = &overrides.input {
            self.input_path = expand(p);
        }
        if let Some(p) = &overrides.output {
            self.output_path = expand(p);
        }
        if let Some(p) = &overrides.media_dir {
            self.media_dir = expand(p);
        }
        if let Some(p) = &overrides.mapping {
            self.mapping_path = expand(p);
        }
        if let Some(indent) = overrides.json_indent {
            self.json_indent = indent;
        }
        self
    }

    /// Defaults, then the config file's shared section, then its
    /// task section, then command-line flags.
    pub fn resolve(task: Task, file: &ConfigFile, cli: &PathOverrides) -> Self {
        let section = match task {
            Task::FixExtension => &file.fix_ext,
            Task::Reindex => &file.reindex,
            Task::Convert => &file.convert,
        };
        Self::defaults_for(task)
            .merge(&file.paths)
            .merge(section)
            .merge(cli)
    }
}

/// Optional path settings, as found in a config file section or on the
/// command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathOverrides {
    pub input: Option<String>,
    pub output: Option<String>,
    pub media_dir: Option<String>,
    pub mapping: Option<String>,
    pub json_indent: Option<usize>,
}

/// On-disk `cavekit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub paths: PathOverrides,
    pub fix_ext: PathOverrides,
    pub reindex: PathOverrides,
    pub convert: PathOverrides,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CaveError::Config(e.to_string()))
    }

    /// Load an explicit config file, or look for `cavekit.toml` in the
    /// working directory and then the user config directory. No file at
    /// all is an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let path = expand(&path.to_string_lossy());
            if !path.is_file() {
                return Err(CaveError::MissingPath(path));
            }
            return Self::read(&path);
        }
        let candidates = std::iter::once(PathBuf::from(CONFIG_FILE_NAME)).chain(
            ProjectDirs::from("", "", "cavekit")
                .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME)),
        );
        for path in candidates {
            if path.is_file() {
                return Self::read(&path);
            }
        }
        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "reading config");
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
            .map_err(|e| CaveError::Config(format!("{}: {e}", path.display())))
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
