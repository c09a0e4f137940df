//! Plain-text extraction: one text unit per line or per paragraph.
//!
//! Deliberately small, but a complete implementation of the filter
//! contract: skeleton capture around each unit, printf-style placeholders
//! lifted into inline codes, separators kept as document parts, and the
//! full open/iterate/cancel/close lifecycle.

use std::collections::VecDeque;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;
use crate::event::Event;
use crate::filter::{Filter, IdSequence, RawDocument};
use crate::fragment::{TagType, TextFragment};
use crate::params::Parameters;
use crate::resource::{DocumentPart, Ending, StartDocument, TextUnit};
use crate::skeleton::Skeleton;
use crate::skeleton::writer::{GenericSkeletonWriter, SkeletonWriter};
use crate::writer::{FilterWriter, GenericFilterWriter};

// printf-style conversions, including positional forms like %1$s
lazy_static! {
    static ref PRINTF_REGEX: Regex =
        Regex::new(r"%(?:\d+\$)?[-+ #0]*\d*(?:\.\d+)?[sdifoxXeEgGcu]").unwrap();
}

/// How the input splits into text units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Every non-blank line is one unit.
    #[default]
    Lines,
    /// Runs of non-blank lines form one unit; blank lines separate.
    Paragraphs,
}

/// Options for [`PlainTextFilter`].
///
/// # Example
///
/// ```rust
/// use locfilter::filters::plaintext::{ExtractionMode, PlainTextOptions};
///
/// let options = PlainTextOptions::new()
///     .with_mode(ExtractionMode::Paragraphs)
///     .with_trim_whitespace(true);
/// assert_eq!(options.mode(), ExtractionMode::Paragraphs);
/// ```
#[derive(Debug, Clone)]
pub struct PlainTextOptions {
    mode: ExtractionMode,
    extract_placeholders: bool,
    trim_whitespace: bool,
}

impl PlainTextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether printf-style placeholders become inline codes. On by
    /// default.
    pub fn with_extract_placeholders(mut self, extract_placeholders: bool) -> Self {
        self.extract_placeholders = extract_placeholders;
        self
    }

    /// Whether leading/trailing blanks move into the skeleton instead of
    /// the extracted text. Off by default.
    pub fn with_trim_whitespace(mut self, trim_whitespace: bool) -> Self {
        self.trim_whitespace = trim_whitespace;
        self
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    pub fn extract_placeholders(&self) -> bool {
        self.extract_placeholders
    }

    pub fn trim_whitespace(&self) -> bool {
        self.trim_whitespace
    }

    fn to_parameters(&self) -> Parameters {
        let mode = match self.mode {
            ExtractionMode::Lines => "lines",
            ExtractionMode::Paragraphs => "paragraphs",
        };
        [
            ("mode", mode.to_string()),
            (
                "extract_placeholders",
                self.extract_placeholders.to_string(),
            ),
            ("trim_whitespace", self.trim_whitespace.to_string()),
        ]
        .into_iter()
        .collect()
    }
}

impl Default for PlainTextOptions {
    fn default() -> Self {
        PlainTextOptions {
            mode: ExtractionMode::Lines,
            extract_placeholders: true,
            trim_whitespace: false,
        }
    }
}

/// Line- and paragraph-oriented [`Filter`] for plain text.
pub struct PlainTextFilter {
    options: PlainTextOptions,
    queue: VecDeque<Event>,
    open: bool,
    primed: bool,
    canceled: bool,
    cancel_delivered: bool,
}

impl PlainTextFilter {
    pub fn new(options: PlainTextOptions) -> Self {
        PlainTextFilter {
            options,
            queue: VecDeque::new(),
            open: false,
            primed: false,
            canceled: false,
            cancel_delivered: false,
        }
    }

    fn build_fragment(&self, text: &str) -> Result<TextFragment, Error> {
        if !self.options.extract_placeholders {
            return Ok(TextFragment::from(text));
        }
        let mut fragment = TextFragment::new();
        let mut cursor = 0;
        for found in PRINTF_REGEX.find_iter(text) {
            fragment.append_text(&text[cursor..found.start()]);
            fragment.append_code(TagType::Placeholder, "x-printf", found.as_str())?;
            cursor = found.end();
        }
        fragment.append_text(&text[cursor..]);
        Ok(fragment)
    }

    fn build_unit(
        &self,
        ids: &mut IdSequence,
        text: &str,
        tail: &str,
        generate_skeleton: bool,
    ) -> Result<TextUnit, Error> {
        let (leading, core, trailing) = if self.options.trim_whitespace {
            split_surrounding_blanks(text)
        } else {
            ("", text, "")
        };
        let mut unit = TextUnit::from_fragment(ids.next_id(), self.build_fragment(core)?)
            .with_preserve_whitespace(!self.options.trim_whitespace);
        if generate_skeleton {
            let mut skeleton = Skeleton::new();
            skeleton.add_text(leading);
            skeleton.add_content_ref(None);
            skeleton.add_text(trailing);
            skeleton.add_text(tail);
            unit.skeleton = Some(skeleton);
        }
        Ok(unit)
    }

    fn build_separator(
        ids: &mut IdSequence,
        text: String,
        generate_skeleton: bool,
    ) -> DocumentPart {
        let part = DocumentPart::new(ids.next_id());
        if generate_skeleton {
            part.with_skeleton(Skeleton::from_text(text))
        } else {
            part
        }
    }

    fn parse(&self, input: &RawDocument, generate_skeleton: bool) -> Result<VecDeque<Event>, Error> {
        let mut events = VecDeque::new();
        let start = StartDocument::new("d1", input.source_locale().clone())
            .with_encoding(input.encoding())
            .with_line_break(input.line_break())
            .with_filter_id(self.name())
            .with_parameters(self.options.to_parameters())
            .with_target_locales(input.target_locales().to_vec());
        let start = match input.name() {
            Some(name) => start.with_name(name),
            None => start,
        };
        events.push_back(Event::StartDocument(start));

        let mut tu_ids = IdSequence::new("tu");
        let mut dp_ids = IdSequence::new("dp");
        let lines = split_lines_keep_breaks(input.content());
        match self.options.mode {
            ExtractionMode::Lines => {
                for (text, brk) in lines {
                    if text.trim().is_empty() {
                        let mut separator = String::from(text);
                        separator.push_str(brk);
                        if !separator.is_empty() {
                            events.push_back(Event::DocumentPart(Self::build_separator(
                                &mut dp_ids,
                                separator,
                                generate_skeleton,
                            )));
                        }
                    } else {
                        events.push_back(Event::TextUnit(self.build_unit(
                            &mut tu_ids,
                            text,
                            brk,
                            generate_skeleton,
                        )?));
                    }
                }
            }
            ExtractionMode::Paragraphs => {
                let mut paragraph = String::new();
                let mut tail = "";
                let mut separator = String::new();
                for (text, brk) in lines {
                    if text.trim().is_empty() {
                        if !paragraph.is_empty() {
                            events.push_back(Event::TextUnit(self.build_unit(
                                &mut tu_ids,
                                &paragraph,
                                tail,
                                generate_skeleton,
                            )?));
                            paragraph.clear();
                        }
                        separator.push_str(text);
                        separator.push_str(brk);
                    } else {
                        if !separator.is_empty() {
                            events.push_back(Event::DocumentPart(Self::build_separator(
                                &mut dp_ids,
                                std::mem::take(&mut separator),
                                generate_skeleton,
                            )));
                        }
                        if !paragraph.is_empty() {
                            // the previous line's break is inside the unit
                            paragraph.push_str(tail);
                        }
                        paragraph.push_str(text);
                        tail = brk;
                    }
                }
                if !paragraph.is_empty() {
                    events.push_back(Event::TextUnit(self.build_unit(
                        &mut tu_ids,
                        &paragraph,
                        tail,
                        generate_skeleton,
                    )?));
                }
                if !separator.is_empty() {
                    events.push_back(Event::DocumentPart(Self::build_separator(
                        &mut dp_ids,
                        separator,
                        generate_skeleton,
                    )));
                }
            }
        }

        events.push_back(Event::EndDocument(Ending::new("d1")));
        Ok(events)
    }
}

impl Default for PlainTextFilter {
    fn default() -> Self {
        Self::new(PlainTextOptions::default())
    }
}

impl Filter for PlainTextFilter {
    fn name(&self) -> &str {
        match self.options.mode {
            ExtractionMode::Lines => "plaintext-lines",
            ExtractionMode::Paragraphs => "plaintext-paragraphs",
        }
    }

    fn open_with(&mut self, input: RawDocument, generate_skeleton: bool) -> Result<(), Error> {
        self.close();
        self.queue = self.parse(&input, generate_skeleton)?;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.queue.clear();
        self.open = false;
        self.primed = false;
        self.canceled = false;
        self.cancel_delivered = false;
    }

    fn cancel(&mut self) {
        if !self.open || self.canceled {
            return;
        }
        self.canceled = true;
        self.cancel_delivered = false;
        // partially delivered documents stay partial; nothing else escapes
        self.queue.clear();
    }

    fn has_next(&mut self) -> bool {
        if self.canceled {
            return false;
        }
        let available = !self.queue.is_empty();
        if available {
            self.primed = true;
        }
        available
    }

    fn next_event(&mut self) -> Result<Event, Error> {
        if self.canceled {
            if self.cancel_delivered {
                return Err(Error::NoSuchElement);
            }
            self.cancel_delivered = true;
            return Ok(Event::Canceled);
        }
        if !self.primed {
            return Err(Error::NoSuchElement);
        }
        self.primed = false;
        self.queue.pop_front().ok_or(Error::NoSuchElement)
    }

    fn create_filter_writer(&self) -> Box<dyn FilterWriter> {
        Box::new(GenericFilterWriter::new(
            self.create_skeleton_writer(),
            self.name(),
        ))
    }

    fn create_skeleton_writer(&self) -> Box<dyn SkeletonWriter> {
        Box::new(GenericSkeletonWriter::new())
    }
}

/// Splits into (line text, line break) pairs, breaks preserved verbatim.
fn split_lines_keep_breaks(content: &str) -> Vec<(&str, &str)> {
    let mut lines = Vec::new();
    let bytes = content.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push((&content[start..i], &content[i..i + 1]));
                i += 1;
                start = i;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') {
                    i + 2
                } else {
                    i + 1
                };
                lines.push((&content[start..i], &content[i..end]));
                i = end;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < content.len() {
        lines.push((&content[start..], ""));
    }
    lines
}

/// Splits off the leading and trailing spaces/tabs of a line.
fn split_surrounding_blanks(text: &str) -> (&str, &str, &str) {
    let is_blank = |c: char| c == ' ' || c == '\t';
    let core_start = text.len() - text.trim_start_matches(is_blank).len();
    let core_end = text.trim_end_matches(is_blank).len();
    if core_start >= core_end {
        // nothing but blanks
        (&text[..0], &text[..0], text)
    } else {
        (
            &text[..core_start],
            &text[core_start..core_end],
            &text[core_end..],
        )
    }
}
