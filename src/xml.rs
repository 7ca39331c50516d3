//! Minimal XML element tree shared by the TCX and Zwift adapters.
//!
//! Parsing goes through `quick_xml::Reader` and keeps only what the adapters
//! need: local element names, attributes, child elements and trimmed text.
//! Serialization mirrors it with an indenting `quick_xml::Writer`.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The document is not well-formed XML
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("XML is not well-formed: {0}")]
pub struct WellFormednessError(pub String);

/// One element and its subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name when parsed; the name as written when built
    pub name: String,
    /// Attributes in document order, keys as written (`xsi:type`)
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: Option<String>,
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Element holding a single text node.
    pub fn text_element(name: impl Into<String>, text: impl ToString) -> Self {
        Self::new(name).with_text(text.to_string())
    }

    /// Attribute value by local name, so `type` matches `xsi:type`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name || (!key.starts_with("xmlns") && local(key) == name))
            .map(|(_, value)| value.as_str())
    }

    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name() == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.local_name() == name)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Trimmed text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlElement::text)
    }

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<XmlElement, WellFormednessError> {
        if input.trim().is_empty() {
            return Err(WellFormednessError("document is empty".to_string()));
        }

        let mut reader = Reader::from_str(input);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|err| {
                WellFormednessError(format!(
                    "{} at byte {}",
                    err,
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(WellFormednessError(
                            "content after the root element".to_string(),
                        ));
                    }
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    close(&mut stack, &mut root, element)?;
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    let element = stack.pop().ok_or_else(|| {
                        WellFormednessError(format!("unexpected closing tag </{}>", name))
                    })?;
                    if element.name != name {
                        return Err(WellFormednessError(format!(
                            "expected </{}>, found </{}>",
                            element.name, name
                        )));
                    }
                    close(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| WellFormednessError(err.to_string()))?;
                    append_text(&mut stack, &value)?;
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    append_text(&mut stack, &value)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(WellFormednessError(format!(
                "unclosed tag <{}> at end of document",
                open.name
            )));
        }

        root.ok_or_else(|| WellFormednessError("document has no root element".to_string()))
    }

    /// Serialize as a complete UTF-8 document with declaration.
    pub fn to_document(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        self.write(&mut writer)?;

        let bytes = writer.into_inner();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, WellFormednessError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| WellFormednessError(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| WellFormednessError(err.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), WellFormednessError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(WellFormednessError(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn append_text(stack: &mut [XmlElement], value: &str) -> Result<(), WellFormednessError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(element) => {
            match &mut element.text {
                Some(existing) => existing.push_str(value),
                None => element.text = Some(value.to_string()),
            }
            Ok(())
        }
        None => Err(WellFormednessError(
            "text outside the root element".to_string(),
        )),
    }
}

/// A structural problem found by a format validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlIssue {
    pub field: String,
    pub message: String,
}

impl XmlIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for XmlIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// `{ valid, errors }` outcome of validating an XML payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlValidationResult {
    pub valid: bool,
    pub errors: Vec<XmlIssue>,
}

impl XmlValidationResult {
    pub fn from_errors(errors: Vec<XmlIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn ok() -> Self {
        Self::from_errors(Vec::new())
    }

    pub fn malformed(err: &WellFormednessError) -> Self {
        Self::from_errors(vec![XmlIssue::new("document", err.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let root = XmlElement::parse(
            r#"<?xml version="1.0"?>
            <a:Root xmlns:a="urn:x" xmlns:xsi="urn:xsi">
              <Item xsi:type="Time_t"><Seconds>300</Seconds></Item>
              <Item id="2"/>
              <Note>fish &amp; chips</Note>
            </a:Root>"#,
        )
        .unwrap();

        assert_eq!(root.name, "Root");
        assert_eq!(root.children_named("Item").count(), 2);
        let first = root.child("Item").unwrap();
        assert_eq!(first.attr("type"), Some("Time_t"));
        assert_eq!(first.child_text("Seconds"), Some("300"));
        assert_eq!(root.child_text("Note"), Some("fish & chips"));
    }

    #[test]
    fn test_empty_input() {
        let err = XmlElement::parse("   ").unwrap_err();
        assert!(err.to_string().contains("not well-formed"));
    }

    #[test]
    fn test_unclosed_tag() {
        let err = XmlElement::parse("<workout_file><workout>").unwrap_err();
        assert!(err.to_string().contains("not well-formed"));
    }

    #[test]
    fn test_mismatched_tag() {
        assert!(XmlElement::parse("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_write_then_parse() {
        let doc = XmlElement::new("workout_file")
            .with_child(XmlElement::text_element("name", "Over <unders>"))
            .with_child(
                XmlElement::new("workout").with_child(
                    XmlElement::new("SteadyState")
                        .with_attr("Duration", 300)
                        .with_attr("Power", 0.75),
                ),
            );

        let text = doc.to_document().unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<SteadyState Duration=\"300\" Power=\"0.75\"/>"));

        let parsed = XmlElement::parse(&text).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_validation_result() {
        assert!(XmlValidationResult::ok().valid);
        let result = XmlValidationResult::malformed(&WellFormednessError("x".into()));
        assert!(!result.valid);
        assert!(result.errors[0].message.contains("well-formed"));
    }
}
