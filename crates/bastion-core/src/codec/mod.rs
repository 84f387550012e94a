//! Canonical serialization of the vault's plaintext document.
//!
//! The vault payload is JSON text, but its byte layout is part of the wire
//! contract: serializing the same logical content must always produce the
//! same bytes, so that re-encryption characteristics stay stable and
//! documents can be diffed in tests. Key order is fixed per object shape,
//! and the shape is decided once when a node is built, never re-sniffed
//! while writing.
//!
//! Unknown keys are legal everywhere - the document mixes a known schema
//! with forward-compatible fields that older and newer builds must carry
//! through untouched. They sort after the canonical keys, lexicographically.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Canonical key order for the vault root object.
const ROOT_ORDER: [&str; 8] = [
    "version",
    "entropy",
    "flags",
    "lastModified",
    "locker",
    "contacts",
    "notes",
    "configs",
];

/// Canonical key order for a credential object.
const CREDENTIAL_ORDER: [&str; 14] = [
    "id",
    "name",
    "username",
    "category",
    "version",
    "length",
    "useSymbols",
    "customPassword",
    "breachStats",
    "compromised",
    "createdAt",
    "updatedAt",
    "usageCount",
    "sortOrder",
];

/// Errors that can occur while handling vault document text.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The input is not structurally valid document text (unterminated
    /// strings or objects, unexpected tokens, bad escapes).
    #[error("Malformed vault document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
}

/// The shape of an object node, fixed at construction time.
///
/// The root object is recognized by its `entropy` seed field and a
/// credential by its `username` field; everything else is opaque and sorts
/// purely lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Root,
    Credential,
    Opaque,
}

impl Shape {
    fn classify(fields: &Map<String, Value>) -> Self {
        if fields.contains_key("entropy") {
            Shape::Root
        } else if fields.contains_key("username") {
            Shape::Credential
        } else {
            Shape::Opaque
        }
    }

    fn canonical_order(self) -> &'static [&'static str] {
        match self {
            Shape::Root => &ROOT_ORDER,
            Shape::Credential => &CREDENTIAL_ORDER,
            Shape::Opaque => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Null,
    Bool(bool),
    // serde_json::Number keeps the integer/float distinction and prints
    // exactly as it parsed, which the byte-stability contract depends on.
    Number(Number),
    String(String),
    Array(Vec<Node>),
    Object(ObjectNode),
}

#[derive(Debug, Clone, PartialEq)]
struct ObjectNode {
    shape: Shape,
    // BTreeMap gives the lexicographic fallback order for free; canonical
    // keys are pulled to the front at write time.
    fields: BTreeMap<String, Node>,
}

impl Node {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from_value).collect()),
            Value::Object(fields) => {
                let shape = Shape::classify(&fields);
                let fields = fields
                    .into_iter()
                    .map(|(k, v)| (k, Node::from_value(v)))
                    .collect();
                Node::Object(ObjectNode { shape, fields })
            }
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Object(obj) => Value::Object(
                obj.fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Node::Null => out.push_str("null"),
            Node::Bool(true) => out.push_str("true"),
            Node::Bool(false) => out.push_str("false"),
            Node::Number(n) => {
                let _ = write!(out, "{n}");
            }
            Node::String(s) => write_escaped(out, s),
            Node::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out);
                }
                out.push(']');
            }
            Node::Object(obj) => obj.write(out),
        }
    }
}

impl ObjectNode {
    fn write(&self, out: &mut String) {
        let canonical = self.shape.canonical_order();
        out.push('{');
        let mut first = true;
        for key in canonical {
            if let Some(node) = self.fields.get(*key) {
                write_entry(out, &mut first, key, node);
            }
        }
        for (key, node) in &self.fields {
            if canonical.contains(&key.as_str()) {
                continue;
            }
            write_entry(out, &mut first, key, node);
        }
        out.push('}');
    }
}

fn write_entry(out: &mut String, first: &mut bool, key: &str, node: &Node) {
    if !*first {
        out.push(',');
    }
    *first = false;
    write_escaped(out, key);
    out.push(':');
    node.write(out);
}

/// Escape a string for output: quote, backslash, and control characters.
fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// A parsed vault document, ready for canonical re-serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Parse document text. Standard escape sequences, including 4-hex-digit
    /// Unicode escapes, are decoded; numbers without a fractional part or
    /// exponent stay integers.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self {
            root: Node::from_value(value),
        })
    }

    /// Build a document from any serializable value (typically a
    /// [`crate::vault::VaultState`]).
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        let value = serde_json::to_value(value)?;
        Ok(Self {
            root: Node::from_value(value),
        })
    }

    /// Deserialize the document into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_value(self.root.to_value())?)
    }

    /// Serialize with canonical key ordering. Never fails: every reachable
    /// document state is representable.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.root.write(&mut out);
        out
    }
}
