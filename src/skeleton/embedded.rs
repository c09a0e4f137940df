//! Skeleton writing for embedded sub-extractions.
//!
//! When a region of a document is re-processed through another filter, the
//! enclosing writer needs the region's rendered output as one opaque
//! string per output locale. [`EmbeddedSkeletonWriter`] runs one
//! [`GenericSkeletonWriter`] per output (the source plus every target
//! locale declared on the start-document resource), accumulates each
//! output in its own buffer, and hands buffers back on demand.

use crate::error::Error;
use crate::locale::LocaleId;
use crate::resource::{DocumentPart, Ending, StartDocument, StartGroup, StartSubDocument, TextUnit};
use crate::skeleton::writer::{GenericSkeletonWriter, SkeletonWriter};

/// Sentinel resource id: a document part carrying this id flushes the
/// primary buffer instead of contributing output.
pub const FLUSH_OUTPUT_ID: &str = "#flush-output#";

#[derive(Debug)]
struct Output {
    locale: Option<LocaleId>,
    writer: GenericSkeletonWriter,
    buffer: String,
}

/// Accumulating [`SkeletonWriter`] for embedded content.
///
/// Buffers exist for every output declared up front; requesting any other
/// locale fails with [`Error::UnexpectedTargetOutput`] rather than
/// producing an empty rendition.
#[derive(Debug)]
pub struct EmbeddedSkeletonWriter {
    outputs: Vec<Output>,
    primary: Option<LocaleId>,
}

impl EmbeddedSkeletonWriter {
    pub fn new() -> Self {
        EmbeddedSkeletonWriter {
            outputs: vec![Output {
                locale: None,
                writer: GenericSkeletonWriter::new(),
                buffer: String::new(),
            }],
            primary: None,
        }
    }

    /// The accumulated output for one locale; `None` selects the source
    /// rendition.
    pub fn output(&self, locale: Option<&LocaleId>) -> Result<&str, Error> {
        self.outputs
            .iter()
            .find(|output| output.locale.as_ref() == locale)
            .map(|output| output.buffer.as_str())
            .ok_or_else(|| match locale {
                Some(locale) => Error::UnexpectedTargetOutput(locale.clone()),
                None => Error::merge("source output buffer not initialized"),
            })
    }

    /// The output for the locale bound at start-document time.
    pub fn primary_output(&self) -> Result<&str, Error> {
        self.output(self.primary.as_ref())
    }

    /// The locales with an accumulating buffer, source first.
    pub fn output_locales(&self) -> impl Iterator<Item = Option<&LocaleId>> {
        self.outputs.iter().map(|output| output.locale.as_ref())
    }

    fn forward<F>(&mut self, mut process: F) -> Result<String, Error>
    where
        F: FnMut(&mut GenericSkeletonWriter) -> Result<String, Error>,
    {
        for output in &mut self.outputs {
            let rendered = process(&mut output.writer)?;
            output.buffer.push_str(&rendered);
        }
        Ok(String::new())
    }
}

impl Default for EmbeddedSkeletonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonWriter for EmbeddedSkeletonWriter {
    /// Builds the buffer set: the source plus every locale in
    /// `resource.target_locales`, each backed by its own inner writer.
    fn process_start_document(
        &mut self,
        output_locale: Option<LocaleId>,
        output_encoding: &str,
        resource: &StartDocument,
    ) -> Result<String, Error> {
        self.primary = output_locale;
        self.outputs = std::iter::once(None)
            .chain(resource.target_locales.iter().cloned().map(Some))
            .map(|locale| Output {
                locale,
                writer: GenericSkeletonWriter::new(),
                buffer: String::new(),
            })
            .collect();
        for output in &mut self.outputs {
            let rendered = output.writer.process_start_document(
                output.locale.clone(),
                output_encoding,
                resource,
            )?;
            output.buffer.push_str(&rendered);
        }
        Ok(String::new())
    }

    fn process_end_document(&mut self, resource: &Ending) -> Result<String, Error> {
        self.forward(|writer| writer.process_end_document(resource))
    }

    fn process_start_sub_document(
        &mut self,
        resource: &StartSubDocument,
    ) -> Result<String, Error> {
        self.forward(|writer| writer.process_start_sub_document(resource))
    }

    fn process_end_sub_document(&mut self, resource: &Ending) -> Result<String, Error> {
        self.forward(|writer| writer.process_end_sub_document(resource))
    }

    fn process_start_group(&mut self, resource: &StartGroup) -> Result<String, Error> {
        self.forward(|writer| writer.process_start_group(resource))
    }

    fn process_end_group(&mut self, resource: &Ending) -> Result<String, Error> {
        self.forward(|writer| writer.process_end_group(resource))
    }

    fn process_text_unit(&mut self, resource: &TextUnit) -> Result<String, Error> {
        self.forward(|writer| writer.process_text_unit(resource))
    }

    fn process_document_part(&mut self, resource: &DocumentPart) -> Result<String, Error> {
        if resource.id == FLUSH_OUTPUT_ID {
            return Ok(self.primary_output()?.to_string());
        }
        self.forward(|writer| writer.process_document_part(resource))
    }

    fn close(&mut self) {
        for output in &mut self.outputs {
            output.writer.close();
        }
        self.outputs = vec![Output {
            locale: None,
            writer: GenericSkeletonWriter::new(),
            buffer: String::new(),
        }];
        self.primary = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TargetBuilding;
    use crate::fragment::TextFragment;
    use crate::skeleton::Skeleton;

    fn locale(tag: &str) -> LocaleId {
        LocaleId::new(tag).unwrap()
    }

    fn embedded_doc() -> StartDocument {
        StartDocument::new("sub1", locale("en"))
            .with_filter_id("plaintext")
            .with_target_locales(vec![locale("fr"), locale("de")])
    }

    fn translated_unit() -> TextUnit {
        let mut unit = TextUnit::from_fragment("tu1", TextFragment::from("Hello"));
        let mut skeleton = Skeleton::new();
        skeleton.add_content_ref(None);
        skeleton.add_text("\n");
        unit.skeleton = Some(skeleton);
        unit.content
            .create_target(locale("fr"), false, TargetBuilding::Empty)[0]
            .content = TextFragment::from("Bonjour");
        unit
    }

    #[test]
    fn test_buffers_initialized_eagerly() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(None, "UTF-8", &embedded_doc())
            .unwrap();
        assert!(writer.output(None).is_ok());
        assert!(writer.output(Some(&locale("fr"))).is_ok());
        assert!(writer.output(Some(&locale("de"))).is_ok());
    }

    #[test]
    fn test_undeclared_locale_is_rejected() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(None, "UTF-8", &embedded_doc())
            .unwrap();
        let err = writer.output(Some(&locale("es"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected target output requested for `es`"
        );
    }

    #[test]
    fn test_each_locale_accumulates_its_own_rendition() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(None, "UTF-8", &embedded_doc())
            .unwrap();
        let emitted = writer.process_text_unit(&translated_unit()).unwrap();
        assert_eq!(emitted, "");
        assert_eq!(writer.output(None).unwrap(), "Hello\n");
        assert_eq!(writer.output(Some(&locale("fr"))).unwrap(), "Bonjour\n");
        // no German target was filled in, so the source shows through
        assert_eq!(writer.output(Some(&locale("de"))).unwrap(), "Hello\n");
    }

    #[test]
    fn test_flush_sentinel_returns_primary_buffer() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(Some(locale("fr")), "UTF-8", &embedded_doc())
            .unwrap();
        writer.process_text_unit(&translated_unit()).unwrap();
        let flushed = writer
            .process_document_part(&DocumentPart::new(FLUSH_OUTPUT_ID))
            .unwrap();
        assert_eq!(flushed, "Bonjour\n");
        // flushing does not consume the buffer
        assert_eq!(writer.output(Some(&locale("fr"))).unwrap(), "Bonjour\n");
    }

    #[test]
    fn test_source_buffer_available_before_start() {
        let writer = EmbeddedSkeletonWriter::new();
        assert_eq!(writer.output(None).unwrap(), "");
    }

    #[test]
    fn test_close_resets_buffers() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(None, "UTF-8", &embedded_doc())
            .unwrap();
        writer.process_text_unit(&translated_unit()).unwrap();
        writer.close();
        assert_eq!(writer.output(None).unwrap(), "");
        assert!(writer.output(Some(&locale("fr"))).is_err());
    }

    #[test]
    fn test_output_locales_lists_source_first() {
        let mut writer = EmbeddedSkeletonWriter::new();
        writer
            .process_start_document(None, "UTF-8", &embedded_doc())
            .unwrap();
        let locales: Vec<Option<&LocaleId>> = writer.output_locales().collect();
        assert_eq!(locales.len(), 3);
        assert_eq!(locales[0], None);
        assert_eq!(locales[1], Some(&locale("fr")));
    }
}
