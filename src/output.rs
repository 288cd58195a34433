//! Turning whatever the image provider handed back into a usable image URL.
//!
//! The provider's output type is not announced in advance and varies by model
//! and by run: a bare URL, a list of URLs, an object holding a URL somewhere,
//! or a file/stream object wrapping the URL. [`classify`] sorts a
//! [`ProviderValue`] into one [`ProviderOutput`] variant, and [`resolve`]
//! applies a fixed, first-match-wins policy to it.

use chrono::Utc;
use indexmap::IndexMap;
use reqwest::Url;
use serde_json::Value;

use crate::error::ResponseShapeError;

/// Type tag carried by stream objects in the provider SDK's runtime.
pub const READABLE_STREAM_TAG: &str = "[object ReadableStream]";

/// Public page for a prediction; used only for the degraded `url()` fallback.
pub const PREDICTION_PAGE_BASE: &str = "https://replicate.com/p";

pub const STREAM_WITHOUT_URL_MESSAGE: &str =
    "Model returned a ReadableStream. The client needs to be updated to handle binary data.";
pub const BINARY_READER_MESSAGE: &str =
    "Model returned binary data instead of URL. Please update client to handle binary responses.";

/// A dynamically typed value as produced by a provider client.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ProviderValue>),
    Object(ProviderObject),
    /// An operation exposed by a runtime object (e.g. `read`, `url`).
    Callable(String),
}

/// An object with named fields and, optionally, runtime identity: the name of
/// its type, its type tag, and what it renders as when turned into a string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderObject {
    pub type_name: Option<String>,
    pub type_tag: Option<String>,
    pub fields: IndexMap<String, ProviderValue>,
    pub display: Option<String>,
}

impl ProviderObject {
    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, ProviderValue)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Default::default()
        }
    }

    /// The file object the provider SDK hands out in file-output mode: a
    /// readable stream over the file whose string form is its URL.
    pub fn file_output(url: &str) -> Self {
        Self {
            type_name: Some("FileOutput".to_string()),
            type_tag: Some(READABLE_STREAM_TAG.to_string()),
            fields: IndexMap::from([
                ("locked".to_string(), ProviderValue::Bool(false)),
                ("read".to_string(), ProviderValue::Callable("read".to_string())),
                ("url".to_string(), ProviderValue::Callable("url".to_string())),
            ]),
            display: Some(url.to_string()),
        }
    }

    pub fn to_display_string(&self) -> String {
        match &self.display {
            Some(d) => d.clone(),
            None => format!("[object {}]", self.type_name.as_deref().unwrap_or("Object")),
        }
    }

    fn string_field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(ProviderValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn has_callable(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(ProviderValue::Callable(_)))
    }

    /// Best-effort guess at whether this is a stream rather than a record.
    ///
    /// This is structural matching against a foreign runtime's object shape,
    /// not a type check: any one of the markers is enough, and an object that
    /// happens to carry them will be treated as a stream.
    pub fn is_stream_like(&self) -> bool {
        self.type_name.as_deref().is_some_and(|n| n.contains("ReadableStream"))
            || self.type_tag.as_deref() == Some(READABLE_STREAM_TAG)
            || (self.fields.contains_key("locked") && self.has_callable("read"))
            || self.to_display_string().contains("ReadableStream")
    }
}

impl ProviderValue {
    /// Short name of the value's kind, for logs and `debugInfo.outputType`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderValue::Null => "null",
            ProviderValue::Bool(_) => "boolean",
            ProviderValue::Number(_) => "number",
            ProviderValue::String(_) => "string",
            ProviderValue::Array(_) => "array",
            ProviderValue::Object(o) if o.is_stream_like() => "stream",
            ProviderValue::Object(_) => "object",
            ProviderValue::Callable(_) => "function",
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            ProviderValue::Null => "null".to_string(),
            ProviderValue::Bool(b) => b.to_string(),
            ProviderValue::Number(n) => n.to_string(),
            ProviderValue::String(s) => s.clone(),
            ProviderValue::Array(items) => items
                .iter()
                .map(ProviderValue::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            ProviderValue::Object(o) => o.to_display_string(),
            ProviderValue::Callable(name) => format!("[function {name}]"),
        }
    }
}

impl From<Value> for ProviderValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ProviderValue::Null,
            Value::Bool(b) => ProviderValue::Bool(b),
            Value::Number(n) => ProviderValue::Number(n),
            Value::String(s) => ProviderValue::String(s),
            Value::Array(items) => ProviderValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => ProviderValue::Object(ProviderObject::with_fields(
                map.into_iter().map(|(k, v)| (k, ProviderValue::from(v))),
            )),
        }
    }
}

/// The closed set of output shapes the resolver knows how to handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    StringValue(String),
    /// Always non-empty.
    SequenceValue(Vec<ProviderValue>),
    StreamLike { display: String },
    FieldObject(ProviderObject),
    Unrecognized(&'static str),
}

pub fn classify(value: ProviderValue) -> ProviderOutput {
    match value {
        ProviderValue::String(s) => ProviderOutput::StringValue(s),
        // An empty list has no elements and no fields: same as an empty object.
        ProviderValue::Array(items) if items.is_empty() => {
            ProviderOutput::FieldObject(ProviderObject::default())
        }
        ProviderValue::Array(items) => ProviderOutput::SequenceValue(items),
        ProviderValue::Object(obj) if obj.is_stream_like() => ProviderOutput::StreamLike {
            display: obj.to_display_string(),
        },
        ProviderValue::Object(obj) => ProviderOutput::FieldObject(obj),
        other => ProviderOutput::Unrecognized(other.kind()),
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    pub image_url: Option<String>,
    pub message: Option<String>,
    pub is_binary: bool,
    /// The URL was synthesized and points at a prediction page, not an image.
    pub degraded: bool,
}

impl Resolution {
    fn url(url: impl Into<String>) -> Self {
        Self { image_url: Some(url.into()), ..Default::default() }
    }

    /// A blank URL is no URL: success must always carry something usable.
    fn non_blank_url(url: impl Into<String>) -> Result<Self, ResponseShapeError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ResponseShapeError::NoImageUrlFound);
        }
        Ok(Self::url(url))
    }

    fn binary_message(message: &str) -> Self {
        Self { message: Some(message.to_string()), is_binary: true, ..Default::default() }
    }
}

pub fn resolve(output: ProviderOutput) -> Result<Resolution, ResponseShapeError> {
    match output {
        ProviderOutput::StringValue(url) => Resolution::non_blank_url(url),
        ProviderOutput::SequenceValue(items) => {
            let first = items
                .into_iter()
                .next()
                .ok_or(ResponseShapeError::EmptyProviderResponse)?;
            match first {
                ProviderValue::Null => Err(ResponseShapeError::NoImageUrlFound),
                ProviderValue::String(s) => Resolution::non_blank_url(s),
                other => Resolution::non_blank_url(other.to_display_string()),
            }
        }
        ProviderOutput::StreamLike { display } => {
            if is_http_url(&display) {
                Ok(Resolution { is_binary: true, ..Resolution::url(display) })
            } else {
                Ok(Resolution::binary_message(STREAM_WITHOUT_URL_MESSAGE))
            }
        }
        ProviderOutput::FieldObject(obj) => resolve_fields(&obj),
        ProviderOutput::Unrecognized(kind) => Err(ResponseShapeError::UnparseableOutput(kind)),
    }
}

fn resolve_fields(obj: &ProviderObject) -> Result<Resolution, ResponseShapeError> {
    if obj.fields.is_empty() {
        return Err(ResponseShapeError::EmptyProviderResponse);
    }
    if let Some(url) = ["url", "image", "output"]
        .iter()
        .find_map(|f| obj.string_field(f))
    {
        return Resolution::non_blank_url(url);
    }
    // A reader with no string URL to fall back on.
    if obj.has_callable("read") {
        return Ok(Resolution::binary_message(BINARY_READER_MESSAGE));
    }
    if obj.has_callable("url") {
        let prediction_id = obj
            .string_field("id")
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        return Ok(Resolution {
            degraded: true,
            ..Resolution::url(format!("{PREDICTION_PAGE_BASE}/{prediction_id}"))
        });
    }
    Err(ResponseShapeError::NoImageUrlFound)
}

fn is_http_url(candidate: &str) -> bool {
    candidate.starts_with("http")
        && Url::parse(candidate).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
