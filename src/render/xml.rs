use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use super::RenderError;

/// Thin wrapper over `quick_xml::Writer` for element-at-a-time output.
///
/// Text and attribute values are escaped by quick-xml.
pub(super) struct XmlWriter {
    inner: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub(super) fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.inner
            .write_event(event)
            .map_err(|e| RenderError::Write(e.to_string()))
    }

    pub(super) fn declaration(&mut self) -> Result<(), RenderError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(super) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attrs.iter().copied());
        self.write(Event::Start(element))
    }

    pub(super) fn end(&mut self, name: &str) -> Result<(), RenderError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(super) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let mut element = BytesStart::new(name);
        element.extend_attributes(attrs.iter().copied());
        self.write(Event::Empty(element))
    }

    pub(super) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), RenderError> {
        self.start(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Writes `<name>text</name>` only when `text` is present.
    pub(super) fn optional(&mut self, name: &str, text: Option<&str>) -> Result<(), RenderError> {
        match text {
            Some(text) => self.text_element(name, &[], text),
            None => Ok(()),
        }
    }

    pub(super) fn finish(self) -> Vec<u8> {
        self.inner.into_inner().into_inner()
    }
}

/// Builds an attribute list, dropping attributes whose value is absent.
pub(super) fn attrs<'a>(pairs: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, &'a str)> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| (*key, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let mut w = XmlWriter::new();
        w.text_element("title", &[("note", "a\"b")], "Fish & <Chips>")
            .unwrap();
        let out = String::from_utf8(w.finish()).unwrap();
        assert_eq!(
            out,
            r#"<title note="a&quot;b">Fish &amp; &lt;Chips&gt;</title>"#
        );
    }

    #[test]
    fn test_optional_skips_none() {
        let mut w = XmlWriter::new();
        w.optional("language", None).unwrap();
        assert!(w.finish().is_empty());
    }

    #[test]
    fn test_attrs_drops_missing_values() {
        let list = attrs(&[("rel", Some("self")), ("title", None), ("href", Some("x"))]);
        assert_eq!(list, vec![("rel", "self"), ("href", "x")]);
    }
}
