//! Markup rendering of a JSON-shaped envelope
//!
//! The Subsonic JSON format is a mechanical image of its XML format, so the
//! markup is produced from the same `serde_json::Value` the JSON rendering
//! uses:
//!
//! - scalar members become attributes of the enclosing element
//! - object members become child elements named after the key
//! - array members become one child element per item, all named after the key;
//!   scalar items become text content (`<versions>1</versions>`)
//! - `null` members are omitted

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

/// Render `content` as a complete document with `root` as the document element
pub fn render_document(root: &str, namespace: &str, content: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    write_object(&mut writer, root, content, Some(namespace))?;

    Ok(writer.into_inner())
}

fn write_object(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    members: &Map<String, Value>,
    namespace: Option<&str>,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(ns) = namespace {
        start.push_attribute(("xmlns", ns));
    }

    let mut has_children = false;
    for (key, value) in members {
        match scalar_text(value) {
            Some(text) => start.push_attribute((key.as_str(), text.as_str())),
            None => has_children |= has_elements(value),
        }
    }

    if !has_children {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for (key, value) in members {
        write_child(writer, key, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

fn write_child(writer: &mut Writer<Vec<u8>>, key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(members) => write_object(writer, key, members, None),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(members) => write_object(writer, key, members, None)?,
                    Value::Array(_) => write_child(writer, key, item)?,
                    Value::Null => {}
                    scalar => write_text_element(writer, key, scalar)?,
                }
            }
            Ok(())
        }
        // Scalars were written as attributes
        _ => Ok(()),
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, key: &str, value: &Value) -> Result<()> {
    let text = scalar_text(value).unwrap_or_default();
    writer
        .write_event(Event::Start(BytesStart::new(key)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(key)))
        .map_err(xml_err)
}

fn has_elements(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn xml_err<E: std::fmt::Display>(err: E) -> ApiError {
    ApiError::Internal(format!("XML serialization failed: {}", err))
}
