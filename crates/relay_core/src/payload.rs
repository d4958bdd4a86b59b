//! Payload parsing for stage results.
//!
//! A stage's `data` is opaque text, normally JSON. The shapes we know how to render are
//! listed once in [`PAYLOAD_SHAPES`] and tried in order; the first shape that matches
//! decides the rendered content. Anything unreadable yields `content: None`, never an
//! error.

use relay_logging::relay_trace;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::hashing::fingerprint;
use crate::model::{ItemId, Question, FEEDBACK_QUESTION_KIND};
use crate::rules::{DEFAULT_QUESTION_TTL_MS, PROMPT_ENHANCEMENT};
use crate::Timestamp;

const BARE_JPEG_PREFIX: &str = "/9j/";
const IMAGE_DATA_URL_PREFIX: &str = "data:image/";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPayload {
    pub content: Option<String>,
    pub image_data: Option<String>,
    pub is_image: Option<bool>,
    pub content_type: Option<String>,
}

impl ParsedPayload {
    fn text(content: String) -> Self {
        Self {
            content: Some(content),
            ..Self::default()
        }
    }

    fn image(content_type: &str, image_data: Option<String>) -> Self {
        Self {
            content: Some(format!(
                "{} image generated successfully",
                subtype_label(content_type)
            )),
            image_data,
            is_image: Some(true),
            content_type: Some(content_type.to_string()),
        }
    }

    fn file(content_type: &str, file_data: Option<String>) -> Self {
        Self {
            content: Some(format!("{content_type} file generated successfully")),
            image_data: file_data,
            is_image: Some(false),
            content_type: Some(content_type.to_string()),
        }
    }

    /// True when there is something to put in front of the user.
    pub fn is_renderable(&self) -> bool {
        self.content
            .as_deref()
            .is_some_and(|content| !content.trim().is_empty())
            || self.image_data.is_some()
    }

    pub fn content_chars(&self) -> usize {
        self.content
            .as_deref()
            .map(|content| content.chars().count())
            .unwrap_or(0)
    }

    /// Fingerprint over `{content, imageData, contentType}` in that order.
    pub fn content_hash(&self) -> String {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct HashInput<'a> {
            content: Option<&'a str>,
            image_data: Option<&'a str>,
            content_type: Option<&'a str>,
        }
        fingerprint(&HashInput {
            content: self.content.as_deref(),
            image_data: self.image_data.as_deref(),
            content_type: self.content_type.as_deref(),
        })
    }
}

/// Parses a raw payload with the shape table only.
pub fn parse_payload(raw: &str) -> ParsedPayload {
    Payload::new(raw).parsed()
}

pub fn content_hash(parsed: &ParsedPayload) -> String {
    parsed.content_hash()
}

#[derive(Clone, Copy)]
enum Step {
    Key(&'static str),
    Index(usize),
}

use Step::{Index, Key};

struct PayloadShape {
    name: &'static str,
    probe: fn(&Map<String, Value>) -> Option<ParsedPayload>,
}

/// Known result shapes, highest priority first.
const PAYLOAD_SHAPES: &[PayloadShape] = &[
    PayloadShape {
        name: "typed image",
        probe: typed_image,
    },
    PayloadShape {
        name: "typed file",
        probe: typed_file,
    },
    PayloadShape {
        name: "bare jpeg",
        probe: bare_jpeg,
    },
    PayloadShape {
        name: "file data",
        probe: file_data,
    },
    PayloadShape {
        name: "message content",
        probe: message_content,
    },
];

const MESSAGE_PATHS: &[&[Step]] = &[
    &[
        Key("data"),
        Key("data"),
        Key("choices"),
        Index(0),
        Key("message"),
        Key("content"),
    ],
    &[Key("data"), Key("choices"), Index(0), Key("message"), Key("content")],
    &[Key("data"), Key("message")],
    &[Key("message")],
];

const QUESTION_PATHS: &[&[Step]] = &[&[Key("question")], &[Key("data"), Key("question")]];

/// A stage payload, decoded once and probed many times.
#[derive(Debug, Clone)]
pub struct Payload<'a> {
    raw: &'a str,
    root: Option<Map<String, Value>>,
}

impl<'a> Payload<'a> {
    pub fn new(raw: &'a str) -> Self {
        let root = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        Self { raw, root }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn is_json_object(&self) -> bool {
        self.root.is_some()
    }

    /// First matching entry of the shape table.
    pub fn parsed(&self) -> ParsedPayload {
        let Some(root) = self.root.as_ref() else {
            return ParsedPayload::default();
        };
        for shape in PAYLOAD_SHAPES {
            if let Some(parsed) = (shape.probe)(root) {
                relay_trace!("payload matched shape '{}'", shape.name);
                return parsed;
            }
        }
        ParsedPayload::default()
    }

    /// [`Self::parsed`], falling back to nested message probes used by finished stages.
    pub fn result(&self) -> ParsedPayload {
        let parsed = self.parsed();
        if parsed.is_renderable() {
            return parsed;
        }
        let Some(root) = self.root.as_ref() else {
            return parsed;
        };
        if let Some(text) = lookup(root, &[Key("data"), Key("data"), Key("message")]).and_then(value_text) {
            return ParsedPayload::text(text);
        }
        if let Some(Value::Object(inner)) = root.get("data") {
            if inner.contains_key("enhancedPrompt") && inner.contains_key("originalPrompt") {
                return ParsedPayload::text(PROMPT_ENHANCEMENT.to_string());
            }
        }
        if let Some(text) = lookup(root, &[Key("data"), Key("message")]).and_then(value_text) {
            return ParsedPayload::text(text);
        }
        parsed
    }

    /// Question embedded in the payload, as an object or a bare string.
    pub fn question(&self, now: Timestamp) -> Option<Question> {
        let root = self.root.as_ref()?;
        QUESTION_PATHS
            .iter()
            .filter_map(|path| lookup(root, path))
            .find_map(|value| question_from_value(value, now))
    }
}

fn typed_image(root: &Map<String, Value>) -> Option<ParsedPayload> {
    let content_type = root.get("contentType")?.as_str()?;
    content_type
        .starts_with("image/")
        .then(|| ParsedPayload::image(content_type, file_payload(root)))
}

fn typed_file(root: &Map<String, Value>) -> Option<ParsedPayload> {
    let content_type = root.get("contentType")?.as_str()?;
    (content_type.starts_with("application/") || content_type.starts_with("text/"))
        .then(|| ParsedPayload::file(content_type, file_payload(root)))
}

fn bare_jpeg(root: &Map<String, Value>) -> Option<ParsedPayload> {
    let data = root.get("data")?.as_str()?;
    data.starts_with(BARE_JPEG_PREFIX)
        .then(|| ParsedPayload::image("image/jpeg", Some(data.to_string())))
}

fn file_data(root: &Map<String, Value>) -> Option<ParsedPayload> {
    let file = root.get("fileData")?.as_str()?;
    if file.starts_with(BARE_JPEG_PREFIX) {
        return Some(ParsedPayload::image("image/jpeg", Some(file.to_string())));
    }
    let header = file.strip_prefix("data:")?;
    if !file.starts_with(IMAGE_DATA_URL_PREFIX) {
        return None;
    }
    let mime = header.split([';', ',']).next().unwrap_or(header);
    Some(ParsedPayload::image(mime, Some(file.to_string())))
}

fn message_content(root: &Map<String, Value>) -> Option<ParsedPayload> {
    MESSAGE_PATHS
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(value_text)
        .map(ParsedPayload::text)
}

/// `fileData` first, then `data`; empty strings do not count.
fn file_payload(root: &Map<String, Value>) -> Option<String> {
    ["fileData", "data"].iter().find_map(|key| {
        root.get(*key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn lookup<'v>(root: &'v Map<String, Value>, path: &[Step]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = match first {
        Key(key) => root.get(*key)?,
        Index(_) => return None,
    };
    for step in rest {
        current = match step {
            Key(key) => current.get(*key)?,
            Index(index) => current.get(*index)?,
        };
    }
    Some(current)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn question_from_value(value: &Value, now: Timestamp) -> Option<Question> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(Question {
            kind: FEEDBACK_QUESTION_KIND.to_string(),
            text: text.clone(),
            item_id: Some(ItemId::Number(now)),
            expires_at: Some(now + DEFAULT_QUESTION_TTL_MS),
        }),
        Value::Object(_) => serde_json::from_value::<Question>(value.clone())
            .ok()
            .filter(|question| !question.text.trim().is_empty()),
        _ => None,
    }
}

/// `image/png` -> `PNG`.
fn subtype_label(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    essence
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .unwrap_or(essence)
        .to_ascii_uppercase()
}
