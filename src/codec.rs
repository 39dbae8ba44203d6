//! Tracker line protocol: request rendering, field encoding and response parsing.

use crate::error::{Error, Result};
use std::borrow::Cow;

const OK_PREFIX: &str = "OK ";
const ERR_PREFIX: &str = "ERR ";

/// Percent-encode a field value. Only ASCII letters, digits and `-_.~` pass
/// through; every other byte becomes `%XX` with uppercase hex.
pub fn encode_field(value: &str) -> String {
    encode_field_bytes(value.as_bytes())
}

/// Byte-oriented form of [`encode_field`].
pub fn encode_field_bytes(value: &[u8]) -> String {
    urlencoding::encode_binary(value).into_owned()
}

/// Reverse [`encode_field_bytes`]. Malformed escapes are kept literally.
pub fn decode_field(value: &str) -> Vec<u8> {
    urlencoding::decode_binary(value.as_bytes()).into_owned()
}

/// Decode a field value that is expected to be UTF-8 text.
pub fn decode_field_str(value: &str) -> Result<String> {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .map_err(|e| Error::Protocol(format!("field value is not UTF-8: {}: {}", value, e)))
}

/// Render `COMMAND&k1=v1&k2=v2` with every value encoded; keys go out verbatim.
pub fn build_request(command: &str, fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .fold(TrackerRequest::new(command), |req, (name, value)| {
            req.field(*name, *value)
        })
        .render()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Plain(String),
    Encoded(String),
}

/// A tracker command and its ordered fields. Duplicate names are not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRequest {
    command: String,
    fields: Vec<(String, FieldValue)>,
}

impl TrackerRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field whose value is encoded when the request is rendered.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), FieldValue::Plain(value.into())));
        self
    }

    /// Add a field whose value is already percent-encoded and is sent as is.
    pub fn encoded_field(mut self, name: impl Into<String>, raw: impl Into<String>) -> Self {
        self.fields
            .push((name.into(), FieldValue::Encoded(raw.into())));
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Field names in send order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Wire form without the trailing newline.
    pub fn render(&self) -> String {
        let mut line = self.command.clone();
        for (name, value) in &self.fields {
            line.push('&');
            line.push_str(name);
            line.push('=');
            match value {
                FieldValue::Plain(v) => line.push_str(&encode_field(v)),
                FieldValue::Encoded(v) => line.push_str(v),
            }
        }
        line
    }
}

/// Fields of a successful response, in the order the tracker sent them.
/// Values are left percent-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFields {
    fields: Vec<(String, String)>,
}

impl ResponseFields {
    fn parse(body: &str) -> Self {
        let fields = body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) => (name.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();
        Self { fields }
    }

    /// Raw value of the first field with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of one tracker response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerResponse {
    Success(ResponseFields),
    Failure { code: String, message: String },
}

impl TrackerResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, TrackerResponse::Success(_))
    }
}

/// Parse a single response line (without its `\n`).
pub fn parse_response(line: &str) -> Result<TrackerResponse> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Err(Error::Protocol("empty response".to_string()));
    }

    if let Some(body) = line.strip_prefix(OK_PREFIX) {
        return Ok(TrackerResponse::Success(ResponseFields::parse(body)));
    }

    if let Some(rest) = line.strip_prefix(ERR_PREFIX) {
        let (code, message) = rest.split_once(' ').unwrap_or((rest, ""));
        if code.is_empty() {
            return Err(Error::Protocol(format!("missing error code: {}", line)));
        }
        return Ok(TrackerResponse::Failure {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    Err(Error::Protocol(format!("unrecognized response: {}", line)))
}
