use super::index::{load_document, write_document};
use crate::error::{CaveError, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

use super::schema::value_label;

/// Persistent userId -> channelId table, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMapping {
    entries: Map<String, Value>,
}

impl ChannelMapping {
    /// Load the mapping file. A missing or unreadable file yields an empty
    /// mapping; the file is created on the next save.
    pub fn load(path: &Path) -> Self {
        match load_document::<Self>(path) {
            Ok(mapping) => {
                tracing::info!(
                    path = %path.display(),
                    "loaded {} existing user mappings",
                    mapping.len()
                );
                mapping
            }
            Err(CaveError::MissingPath(_)) => {
                tracing::info!(path = %path.display(), "no mapping file yet, starting empty");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unusable mapping file: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path, indent: usize) -> Result<()> {
        write_document(path, self, indent)?;
        tracing::info!(path = %path.display(), "saved {} user mappings", self.len());
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.entries.get(user_id).and_then(value_label)
    }

    pub fn insert(&mut self, user_id: &str, channel_id: &str) {
        self.entries
            .insert(user_id.to_string(), Value::String(channel_id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("interrupted by user")]
    Interrupted,
    #[error("no channel known for user '{0}'")]
    Unknown(String),
}

/// Supplies the channel of a user the mapping does not know yet.
pub trait ChannelResolver {
    fn resolve(&mut self, user_id: &str, user_name: &str) -> std::result::Result<String, ResolveError>;
}

impl<F> ChannelResolver for F
where
    F: FnMut(&str, &str) -> std::result::Result<String, ResolveError>,
{
    fn resolve(&mut self, user_id: &str, user_name: &str) -> std::result::Result<String, ResolveError> {
        self(user_id, user_name)
    }
}

/// Refuses every unknown user. For batch runs with a pre-filled mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictResolver;

impl ChannelResolver for StrictResolver {
    fn resolve(&mut self, user_id: &str, _user_name: &str) -> std::result::Result<String, ResolveError> {
        Err(ResolveError::Unknown(user_id.to_string()))
    }
}

/// Asks on the terminal. Empty answers are refused; Ctrl-C or a closed
/// input ends the prompt session as `Interrupted`.
pub struct PromptResolver {
    theme: ColorfulTheme,
}

impl Default for PromptResolver {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl ChannelResolver for PromptResolver {
    fn resolve(&mut self, user_id: &str, user_name: &str) -> std::result::Result<String, ResolveError> {
        let answer = Input::<String>::with_theme(&self.theme)
            .with_prompt(format!("channelId for new user '{user_id}' ({user_name})"))
            .validate_with(|input: &String| -> std::result::Result<(), &'static str> {
                if input.trim().is_empty() {
                    Err("channelId must not be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .map_err(|e| {
                tracing::debug!("prompt ended: {e}");
                ResolveError::Interrupted
            })?;
        Ok(answer.trim().to_string())
    }
}
