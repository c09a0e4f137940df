//! The pull-based filter contract and its input plumbing.
//!
//! A [`Filter`] turns one open document into a stream of [`Event`]s:
//! `open`, then `has_next`/`next_event` until exhausted, then `close`.
//! [`RawDocument`] carries the input along with the locales and decoding
//! information a filter needs; byte inputs are decoded BOM-aware so UTF-16
//! documents with a byte-order mark come through without configuration.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::Error;
use crate::event::{Event, EventKind};
use crate::locale::LocaleId;
use crate::skeleton::writer::SkeletonWriter;
use crate::writer::FilterWriter;

/// A pull-based extraction filter over one document at a time.
///
/// One instance handles one open document; it is not meant for concurrent
/// use. `cancel` is cooperative: it takes effect at the next iteration
/// boundary, after which `has_next` is false and a single
/// [`Event::Canceled`] is delivered.
pub trait Filter {
    /// Stable identifier of this filter configuration, reported in
    /// `StartDocument.filter_id`.
    fn name(&self) -> &str;

    /// Binds the filter to an input with skeleton capture enabled.
    fn open(&mut self, input: RawDocument) -> Result<(), Error> {
        self.open_with(input, true)
    }

    /// Binds the filter to an input; `generate_skeleton` controls whether
    /// resources carry skeleton chunks.
    fn open_with(&mut self, input: RawDocument, generate_skeleton: bool) -> Result<(), Error>;

    /// Releases the input. Idempotent; the filter can be reopened.
    fn close(&mut self);

    /// Requests cancellation of the current iteration.
    fn cancel(&mut self);

    /// Whether another event is available. May advance internal lookahead
    /// state, and arms the following `next_event()` call.
    fn has_next(&mut self) -> bool;

    /// The next event. Fails with [`Error::NoSuchElement`] unless preceded
    /// by a successful `has_next()`.
    fn next_event(&mut self) -> Result<Event, Error>;

    fn create_filter_writer(&self) -> Box<dyn FilterWriter>;

    fn create_skeleton_writer(&self) -> Box<dyn SkeletonWriter>;
}

/// An input document bound to its locales and decoding metadata.
#[derive(Debug, Clone)]
pub struct RawDocument {
    content: String,
    source_locale: LocaleId,
    target_locales: Vec<LocaleId>,
    encoding: String,
    line_break: String,
    name: Option<String>,
}

impl RawDocument {
    /// Wraps already-decoded text.
    pub fn new(content: impl Into<String>, source_locale: LocaleId) -> Self {
        let content = content.into();
        let line_break = detect_line_break(&content).to_string();
        RawDocument {
            content,
            source_locale,
            target_locales: Vec::new(),
            encoding: "UTF-8".to_string(),
            line_break,
            name: None,
        }
    }

    /// Decodes bytes, honoring a byte-order mark over the optional
    /// `encoding` label.
    pub fn from_bytes(
        bytes: &[u8],
        encoding: Option<&str>,
        source_locale: LocaleId,
    ) -> Result<Self, Error> {
        Self::from_reader(bytes, encoding, source_locale)
    }

    /// Decodes a reader, honoring a byte-order mark over the optional
    /// `encoding` label.
    pub fn from_reader<R: Read>(
        reader: R,
        encoding: Option<&str>,
        source_locale: LocaleId,
    ) -> Result<Self, Error> {
        let mut builder = DecodeReaderBytesBuilder::new();
        builder.bom_override(true);
        if let Some(label) = encoding {
            let resolved = encoding_rs::Encoding::for_label(label.as_bytes())
                .ok_or_else(|| Error::bad_input(format!("unknown encoding label `{label}`")))?;
            builder.encoding(Some(resolved));
        }
        let mut decoder = builder.build(reader);
        let mut content = String::new();
        decoder.read_to_string(&mut content)?;
        let mut document = RawDocument::new(content, source_locale);
        if let Some(label) = encoding {
            document.encoding = label.to_string();
        }
        Ok(document)
    }

    /// Opens and decodes a file, taking the document name from the file
    /// name.
    pub fn from_path(
        path: impl AsRef<Path>,
        encoding: Option<&str>,
        source_locale: LocaleId,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut document = Self::from_reader(file, encoding, source_locale)?;
        document.name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(document)
    }

    pub fn with_target_locales(mut self, target_locales: Vec<LocaleId>) -> Self {
        self.target_locales = target_locales;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_locale(&self) -> &LocaleId {
        &self.source_locale
    }

    pub fn target_locales(&self) -> &[LocaleId] {
        &self.target_locales
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The dominant line-break sequence of the content.
    pub fn line_break(&self) -> &str {
        &self.line_break
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn detect_line_break(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else if content.contains('\r') {
        "\r"
    } else {
        "\n"
    }
}

/// Generates per-document resource ids like `tu1`, `tu2`.
#[derive(Debug, Clone)]
pub struct IdSequence {
    prefix: String,
    next: u64,
}

impl IdSequence {
    pub fn new(prefix: impl Into<String>) -> Self {
        IdSequence {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{}{}", self.prefix, self.next)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Checks the stream shape every filter guarantees: one document envelope,
/// properly nested groups, and content only inside the envelope.
pub fn validate_event_order(events: &[Event]) -> Result<(), Error> {
    let mut started = false;
    let mut finished = false;
    let mut group_depth = 0usize;
    let mut sub_document = false;
    for (position, event) in events.iter().enumerate() {
        if finished {
            return Err(Error::bad_input(format!(
                "event {} ({}) after END_DOCUMENT",
                position,
                event.kind()
            )));
        }
        match event.kind() {
            EventKind::StartDocument => {
                if started {
                    return Err(Error::bad_input("duplicate START_DOCUMENT".to_string()));
                }
                started = true;
            }
            EventKind::EndDocument => {
                if !started {
                    return Err(Error::bad_input(
                        "END_DOCUMENT without START_DOCUMENT".to_string(),
                    ));
                }
                if group_depth != 0 {
                    return Err(Error::bad_input(format!(
                        "END_DOCUMENT with {} unclosed group(s)",
                        group_depth
                    )));
                }
                if sub_document {
                    return Err(Error::bad_input(
                        "END_DOCUMENT inside an open sub-document".to_string(),
                    ));
                }
                finished = true;
            }
            EventKind::StartSubDocument => {
                if !started || sub_document {
                    return Err(Error::bad_input(format!(
                        "misplaced START_SUBDOCUMENT at event {}",
                        position
                    )));
                }
                sub_document = true;
            }
            EventKind::EndSubDocument => {
                if !sub_document {
                    return Err(Error::bad_input(format!(
                        "END_SUBDOCUMENT without START_SUBDOCUMENT at event {}",
                        position
                    )));
                }
                sub_document = false;
            }
            EventKind::StartGroup => {
                if !started {
                    return Err(Error::bad_input(
                        "START_GROUP before START_DOCUMENT".to_string(),
                    ));
                }
                group_depth += 1;
            }
            EventKind::EndGroup => {
                if group_depth == 0 {
                    return Err(Error::bad_input(format!(
                        "unbalanced END_GROUP at event {}",
                        position
                    )));
                }
                group_depth -= 1;
            }
            EventKind::TextUnit | EventKind::DocumentPart | EventKind::Custom => {
                if !started {
                    return Err(Error::bad_input(format!(
                        "{} before START_DOCUMENT",
                        event.kind()
                    )));
                }
            }
            EventKind::Canceled => {
                if position + 1 != events.len() {
                    return Err(Error::bad_input(
                        "CANCELED must be the final event".to_string(),
                    ));
                }
                return Ok(());
            }
        }
    }
    if started && !finished {
        return Err(Error::bad_input("missing END_DOCUMENT".to_string()));
    }
    Ok(())
}
