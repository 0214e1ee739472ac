use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ELEMENTS_KEY: &str = "elements";
pub const FILE_KEY: &str = "file";
pub const TYPE_KEY: &str = "type";

/// Label used for a missing channel or user, matching existing exports.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Media kinds that own a physical file in the media directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
    Gif,
}

impl AttachmentKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "file" => Some(Self::File),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Gif => "gif",
        }
    }
}

/// One element of a cave. Only the `file` field is ever rewritten; every
/// other field is carried through in its original order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment {
    fields: Map<String, Value>,
}

impl Attachment {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn kind_tag(&self) -> Option<&str> {
        self.fields.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// `None` for non-media elements such as `text`.
    pub fn kind(&self) -> Option<AttachmentKind> {
        self.kind_tag().and_then(AttachmentKind::from_tag)
    }

    pub fn file(&self) -> Option<&str> {
        self.fields.get(FILE_KEY).and_then(Value::as_str)
    }

    pub fn set_file(&mut self, name: impl Into<String>) {
        self.fields
            .insert(FILE_KEY.to_string(), Value::String(name.into()));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// A cave as stored in an export document.
///
/// The raw object is kept so that unknown keys and key order survive a
/// load/save cycle. `elements` is parsed into [`Attachment`]s and written
/// back into its original slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    fields: Map<String, Value>,
    attachments: Vec<Attachment>,
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let attachments = match fields.get_mut(ELEMENTS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => std::mem::take(items)
                .into_iter()
                .map(|item| match item {
                    Value::Object(obj) => Ok(Attachment::from_fields(obj)),
                    other => Err(format!("element is not an object: {other}")),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(format!("`elements` is not an array: {other}")),
        };
        Ok(Self {
            fields,
            attachments,
        })
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        let Record {
            mut fields,
            attachments,
        } = record;
        if fields.contains_key(ELEMENTS_KEY) || !attachments.is_empty() {
            let items = attachments
                .into_iter()
                .map(|a| Value::Object(a.into_fields()))
                .collect();
            fields.insert(ELEMENTS_KEY.to_string(), Value::Array(items));
        }
        fields
    }
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn id(&self) -> Option<String> {
        self.fields.get("id").and_then(value_label)
    }

    pub fn channel_id(&self) -> String {
        self.label_or_unknown("channelId")
    }

    pub fn user_id(&self) -> String {
        self.label_or_unknown("userId")
    }

    pub fn time(&self) -> Option<&str> {
        self.fields.get("time").and_then(Value::as_str)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut [Attachment] {
        &mut self.attachments
    }

    fn label_or_unknown(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(value_label)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }
}

/// Render an id-like JSON value (string or number) the way it appears in
/// filenames.
pub fn value_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Loose truthiness used when screening legacy rows: null, false, 0, "",
/// [] and {} count as absent.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
