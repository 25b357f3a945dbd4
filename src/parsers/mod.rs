//! Content parsers.
//!
//! Decode raw event bytes into the structured value used as template
//! context. Every parser produces a `serde_json::Value` so templates and
//! rules see one data model regardless of wire format.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from decoding event content.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unknown parser: '{0}'")]
    UnknownParser(String),

    #[error("invalid JSON content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML content: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML content: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid XML content: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid XML content: {0}")]
    XmlStructure(String),

    #[error("content is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Decodes raw bytes into a structured value.
pub trait Parser: Send + Sync {
    fn parse_content(&self, data: &[u8]) -> Result<Value, ParseError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse_content(&self, data: &[u8]) -> Result<Value, ParseError> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TomlParser;

impl Parser for TomlParser {
    fn parse_content(&self, data: &[u8]) -> Result<Value, ParseError> {
        let text = std::str::from_utf8(data)?;
        let table: toml::Table = toml::from_str(text)?;
        Ok(serde_json::to_value(table)?)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl Parser for YamlParser {
    fn parse_content(&self, data: &[u8]) -> Result<Value, ParseError> {
        Ok(serde_yaml::from_slice(data)?)
    }
}

/// Maps an XML document onto the JSON value model.
///
/// ```text
/// <push ref="main"><repo>a</repo><repo>b</repo></push>
///     → {"push": {"@ref": "main", "repo": ["a", "b"]}}
/// ```
///
/// Attributes become `@name` keys, repeated children become arrays, and
/// an element holding only text becomes that string. Text mixed with
/// attributes or children is kept under `#text`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlParser;

#[derive(Debug)]
struct XmlElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl XmlElement {
    fn open(start: &BytesStart<'_>) -> Result<Self, ParseError> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            fields.insert(key, Value::String(attr.unescape_value()?.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.fields.is_empty() {
            return Value::String(text.to_string());
        }
        let mut fields = self.fields;
        if !text.is_empty() {
            fields.insert("#text".into(), Value::String(text.to_string()));
        }
        Value::Object(fields)
    }
}

fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

impl Parser for XmlParser {
    fn parse_content(&self, data: &[u8]) -> Result<Value, ParseError> {
        let text = std::str::from_utf8(data)?;
        let mut reader = Reader::from_str(text);
        let mut open: Vec<XmlElement> = Vec::new();
        let mut root: Option<Value> = None;

        loop {
            let closed = match reader.read_event()? {
                Event::Start(start) => {
                    open.push(XmlElement::open(&start)?);
                    None
                }
                Event::Empty(start) => Some(XmlElement::open(&start)?),
                Event::End(_) => open.pop(),
                Event::Text(content) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&content.unescape()?);
                    }
                    None
                }
                Event::CData(content) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&content));
                    }
                    None
                }
                Event::Eof => break,
                _ => None,
            };

            let Some(element) = closed else { continue };
            let name = element.name.clone();
            let value = element.into_value();
            match open.last_mut() {
                Some(parent) => insert_child(&mut parent.fields, name, value),
                None if root.is_none() => {
                    let mut document = Map::new();
                    document.insert(name, value);
                    root = Some(Value::Object(document));
                }
                None => return Err(ParseError::XmlStructure("more than one root element".into())),
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(ParseError::XmlStructure(format!("unclosed element <{}>", unclosed.name)));
        }
        root.ok_or_else(|| ParseError::XmlStructure("no root element".into()))
    }
}

const KNOWN: &[&str] = &["json", "toml", "yaml", "xml"];

/// Returns true if `name` refers to a built-in parser.
pub fn is_known(name: &str) -> bool {
    KNOWN.contains(&name)
}

/// Look up a parser by its configured name.
pub fn make_parser(name: &str) -> Result<&'static dyn Parser, ParseError> {
    match name {
        "json" => Ok(&JsonParser),
        "toml" => Ok(&TomlParser),
        "yaml" => Ok(&YamlParser),
        "xml" => Ok(&XmlParser),
        other => Err(ParseError::UnknownParser(other.to_string())),
    }
}

/// Parse `data` with the named parser.
pub fn parse(data: &[u8], parser_name: &str) -> Result<Value, ParseError> {
    let parser = make_parser(parser_name)?;
    tracing::debug!(parser = parser_name, bytes = data.len(), "Parsing content");
    parser.parse_content(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        let value = parse(br#"{"action": "opened", "number": 7}"#, "json").unwrap();
        assert_eq!(value, json!({"action": "opened", "number": 7}));
    }

    #[test]
    fn test_parse_toml() {
        let value = parse(b"action = \"opened\"\n[repo]\nname = \"switchyard\"\n", "toml").unwrap();
        assert_eq!(value["action"], "opened");
        assert_eq!(value["repo"]["name"], "switchyard");
    }

    #[test]
    fn test_invalid_content() {
        assert!(matches!(parse(b"{not json", "json"), Err(ParseError::Json(_))));
        assert!(matches!(parse(b"= nope", "toml"), Err(ParseError::Toml(_))));
    }

    #[test]
    fn test_parse_yaml() {
        let value = parse(b"action: opened\nnumber: 7\nlabels:\n  - bug\n  - ui\n", "yaml").unwrap();
        assert_eq!(value, json!({"action": "opened", "number": 7, "labels": ["bug", "ui"]}));
        assert!(matches!(parse(b"action: [unclosed", "yaml"), Err(ParseError::Yaml(_))));
    }

    #[test]
    fn test_parse_xml() {
        let value = parse(
            br#"<?xml version="1.0"?>
<build status="failed">
  <job>deploy &amp; test</job>
  <step>compile</step>
  <step>link</step>
  <node id="7"/>
  <log><![CDATA[a < b]]></log>
</build>"#,
            "xml",
        )
        .unwrap();

        assert_eq!(
            value,
            json!({"build": {
                "@status": "failed",
                "job": "deploy & test",
                "step": ["compile", "link"],
                "node": {"@id": "7"},
                "log": "a < b",
            }})
        );
    }

    #[test]
    fn test_xml_text_beside_children() {
        let value = parse(b"<note>hi <b>there</b></note>", "xml").unwrap();
        assert_eq!(value, json!({"note": {"b": "there", "#text": "hi"}}));
    }

    #[test]
    fn test_invalid_xml() {
        assert!(parse(b"<a><b></a>", "xml").is_err());
        assert!(matches!(parse(b"<a>", "xml"), Err(_)));
        assert!(matches!(parse(b"<a/><b/>", "xml"), Err(ParseError::XmlStructure(_))));
        assert!(matches!(parse(b"", "xml"), Err(ParseError::XmlStructure(_))));
    }

    #[test]
    fn test_unknown_parser() {
        assert!(matches!(parse(b"a,b", "csv"), Err(ParseError::UnknownParser(name)) if name == "csv"));
        for name in ["json", "toml", "yaml", "xml"] {
            assert!(is_known(name));
        }
        assert!(!is_known("csv"));
    }
}
