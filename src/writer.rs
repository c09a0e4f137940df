//! Filter writers: the consuming end of an event stream.
//!
//! A [`FilterWriter`] takes events in document order, drives a
//! [`SkeletonWriter`] to rebuild output text, and owns the output sink.
//! [`GenericFilterWriter`] works for any format whose output is fully
//! described by skeletons; format crates with special serialization needs
//! implement the trait themselves.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::event::Event;
use crate::locale::LocaleId;
use crate::skeleton::writer::SkeletonWriter;

/// Consumes an event stream and writes the reconstructed document.
pub trait FilterWriter {
    fn name(&self) -> &str;

    /// Binds the output locale (`None` writes the source rendition) and
    /// encoding. Call before the first event; an empty encoding falls back
    /// to the document's own.
    fn set_options(&mut self, locale: Option<LocaleId>, encoding: &str);

    /// Directs output to a file, created on the spot.
    fn set_output_path(&mut self, path: &Path) -> Result<(), Error>;

    /// Directs output to an arbitrary sink.
    fn set_output_writer(&mut self, writer: Box<dyn Write>);

    fn handle_event(&mut self, event: &Event) -> Result<(), Error>;

    /// Flushes and releases the sink. Idempotent.
    fn close(&mut self) -> Result<(), Error>;
}

enum Sink {
    Buffer(Vec<u8>),
    Writer(Box<dyn Write>),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Buffer(buffer) => {
                buffer.extend_from_slice(bytes);
                Ok(())
            }
            Sink::Writer(writer) => writer.write_all(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Buffer(_) => Ok(()),
            Sink::Writer(writer) => writer.flush(),
        }
    }
}

/// Skeleton-driven [`FilterWriter`]. Without an explicit sink it collects
/// output in memory, which is what the round-trip tests read back.
pub struct GenericFilterWriter {
    name: String,
    skeleton_writer: Box<dyn SkeletonWriter>,
    output_locale: Option<LocaleId>,
    requested_encoding: String,
    encoder: Option<&'static encoding_rs::Encoding>,
    sink: Sink,
    closed: bool,
}

impl GenericFilterWriter {
    pub fn new(skeleton_writer: Box<dyn SkeletonWriter>, name: impl Into<String>) -> Self {
        GenericFilterWriter {
            name: name.into(),
            skeleton_writer,
            output_locale: None,
            requested_encoding: String::new(),
            encoder: None,
            sink: Sink::Buffer(Vec::new()),
            closed: false,
        }
    }

    /// The collected output when writing to the in-memory sink.
    pub fn output_bytes(&self) -> Option<&[u8]> {
        match &self.sink {
            Sink::Buffer(buffer) => Some(buffer),
            Sink::Writer(_) => None,
        }
    }

    /// Takes the collected output, leaving an empty buffer behind.
    pub fn take_output_bytes(&mut self) -> Option<Vec<u8>> {
        match &mut self.sink {
            Sink::Buffer(buffer) => Some(std::mem::take(buffer)),
            Sink::Writer(_) => None,
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        let bytes: Cow<'_, [u8]> = match self.encoder {
            Some(encoding) if encoding != encoding_rs::UTF_8 => encoding.encode(text).0,
            _ => Cow::Borrowed(text.as_bytes()),
        };
        self.sink.write_all(&bytes)?;
        Ok(())
    }

    fn resolve_encoding(&mut self, document_encoding: &str) -> Result<(), Error> {
        let label = if self.requested_encoding.is_empty() {
            document_encoding
        } else {
            &self.requested_encoding
        };
        self.encoder = Some(
            encoding_rs::Encoding::for_label(label.as_bytes())
                .ok_or_else(|| Error::bad_input(format!("unknown encoding label `{label}`")))?,
        );
        self.requested_encoding = label.to_string();
        Ok(())
    }
}

impl FilterWriter for GenericFilterWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_options(&mut self, locale: Option<LocaleId>, encoding: &str) {
        self.output_locale = locale;
        self.requested_encoding = encoding.to_string();
    }

    fn set_output_path(&mut self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        self.sink = Sink::Writer(Box::new(BufWriter::new(file)));
        Ok(())
    }

    fn set_output_writer(&mut self, writer: Box<dyn Write>) {
        self.sink = Sink::Writer(writer);
    }

    fn handle_event(&mut self, event: &Event) -> Result<(), Error> {
        let rendered = match event {
            Event::StartDocument(resource) => {
                self.closed = false;
                self.resolve_encoding(&resource.encoding)?;
                let locale = self.output_locale.clone();
                let encoding = self.requested_encoding.clone();
                self.skeleton_writer
                    .process_start_document(locale, &encoding, resource)?
            }
            Event::EndDocument(resource) => {
                let rendered = self.skeleton_writer.process_end_document(resource)?;
                self.write_text(&rendered)?;
                self.close()?;
                return Ok(());
            }
            Event::StartSubDocument(resource) => {
                self.skeleton_writer.process_start_sub_document(resource)?
            }
            Event::EndSubDocument(resource) => {
                self.skeleton_writer.process_end_sub_document(resource)?
            }
            Event::StartGroup(resource) => self.skeleton_writer.process_start_group(resource)?,
            Event::EndGroup(resource) => self.skeleton_writer.process_end_group(resource)?,
            Event::TextUnit(resource) => self.skeleton_writer.process_text_unit(resource)?,
            Event::DocumentPart(resource) => {
                self.skeleton_writer.process_document_part(resource)?
            }
            Event::Custom(_) => String::new(),
            Event::Canceled => {
                self.close()?;
                return Ok(());
            }
        };
        self.write_text(&rendered)
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.skeleton_writer.close();
        self.sink.flush()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TargetBuilding;
    use crate::fragment::TextFragment;
    use crate::resource::{DocumentPart, Ending, StartDocument, TextUnit};
    use crate::skeleton::Skeleton;
    use crate::skeleton::writer::GenericSkeletonWriter;

    fn locale(tag: &str) -> LocaleId {
        LocaleId::new(tag).unwrap()
    }

    fn writer() -> GenericFilterWriter {
        GenericFilterWriter::new(Box::new(GenericSkeletonWriter::new()), "generic")
    }

    fn simple_events() -> Vec<Event> {
        let mut unit = TextUnit::from_fragment("tu1", TextFragment::from("Hello"));
        let mut skeleton = Skeleton::new();
        skeleton.add_content_ref(None);
        skeleton.add_text("\n");
        unit.skeleton = Some(skeleton);
        unit.content
            .create_target(locale("fr"), false, TargetBuilding::Empty)[0]
            .content = TextFragment::from("Bonjour");
        vec![
            Event::StartDocument(StartDocument::new("d1", locale("en"))),
            Event::DocumentPart(
                DocumentPart::new("dp1").with_skeleton(Skeleton::from_text("# header\n")),
            ),
            Event::TextUnit(unit),
            Event::EndDocument(Ending::new("d1")),
        ]
    }

    #[test]
    fn test_writes_source_rendition_to_buffer() {
        let mut writer = writer();
        for event in &simple_events() {
            writer.handle_event(event).unwrap();
        }
        let bytes = writer.output_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "# header\nHello\n"
        );
    }

    #[test]
    fn test_writes_target_rendition_when_bound() {
        let mut writer = writer();
        writer.set_options(Some(locale("fr")), "");
        for event in &simple_events() {
            writer.handle_event(event).unwrap();
        }
        let bytes = writer.take_output_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "# header\nBonjour\n"
        );
    }

    #[test]
    fn test_encodes_output_with_requested_charset() {
        let mut writer = writer();
        writer.set_options(None, "windows-1252");
        let events = vec![
            Event::StartDocument(StartDocument::new("d1", locale("fr"))),
            Event::TextUnit(TextUnit::from_fragment("tu1", TextFragment::from("café"))),
            Event::EndDocument(Ending::new("d1")),
        ];
        for event in &events {
            writer.handle_event(event).unwrap();
        }
        let bytes = writer.output_bytes().unwrap();
        assert_eq!(bytes, b"caf\xE9");
    }

    #[test]
    fn test_unknown_output_encoding_fails() {
        let mut writer = writer();
        writer.set_options(None, "not-a-charset");
        let start = Event::StartDocument(StartDocument::new("d1", locale("en")));
        assert!(writer.handle_event(&start).is_err());
    }

    #[test]
    fn test_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut writer = writer();
        writer.set_output_path(&path).unwrap();
        for event in &simple_events() {
            writer.handle_event(event).unwrap();
        }
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "# header\nHello\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer = writer();
        for event in &simple_events() {
            writer.handle_event(event).unwrap();
        }
        writer.close().unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_canceled_closes_the_writer() {
        let mut writer = writer();
        let start = Event::StartDocument(StartDocument::new("d1", locale("en")));
        writer.handle_event(&start).unwrap();
        writer.handle_event(&Event::Canceled).unwrap();
        writer.close().unwrap();
    }
}
