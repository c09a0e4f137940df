//! Delegating filter over a registry of sub-format readers.
//!
//! A [`CompoundFilter`] presents several sibling readers as one filter
//! configuration: every contract operation goes to the currently active
//! sibling, and the START_DOCUMENT it reports is rewritten so callers see
//! the compound's identity instead of the internal delegation.

use std::fmt::Display;

use crate::error::Error;
use crate::event::Event;
use crate::filter::{Filter, RawDocument};
use crate::filters::plaintext::{ExtractionMode, PlainTextFilter, PlainTextOptions};
use crate::params::Parameters;
use crate::skeleton::writer::{GenericSkeletonWriter, SkeletonWriter};
use crate::writer::{FilterWriter, GenericFilterWriter};

/// The sub-formats a [`CompoundFilter`] can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubFormat {
    /// Line-oriented plain text.
    Lines,
    /// Paragraph-oriented plain text.
    Paragraphs,
}

impl SubFormat {
    /// Identifier reported in the compound's parameters.
    pub fn label(&self) -> &'static str {
        match self {
            SubFormat::Lines => "lines",
            SubFormat::Paragraphs => "paragraphs",
        }
    }
}

impl Display for SubFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A [`Filter`] that routes one of several registered sibling readers
/// behind a single configuration identity.
///
/// Siblings are registered per [`SubFormat`]; the first registered one is
/// active until [`activate`](CompoundFilter::activate) selects another.
/// Selection is a configuration-time operation, meant to happen before
/// `open`.
///
/// # Example
///
/// ```rust
/// use locfilter::filter::{Filter, RawDocument};
/// use locfilter::filters::compound::{CompoundFilter, SubFormat};
/// use locfilter::{Event, LocaleId};
///
/// let mut filter = CompoundFilter::plain_text();
/// filter.activate(SubFormat::Paragraphs)?;
/// filter.open(RawDocument::new("one\ntwo\n\nthree\n", LocaleId::new("en")?))?;
///
/// let mut units = 0;
/// while filter.has_next() {
///     if let Event::TextUnit(_) = filter.next_event()? {
///         units += 1;
///     }
/// }
/// assert_eq!(units, 2);
/// # Ok::<(), locfilter::Error>(())
/// ```
pub struct CompoundFilter {
    name: String,
    siblings: Vec<(SubFormat, Box<dyn Filter>)>,
    active: usize,
}

impl CompoundFilter {
    /// Creates a compound with an empty registry.
    pub fn new(name: impl Into<String>) -> Self {
        CompoundFilter {
            name: name.into(),
            siblings: Vec::new(),
            active: 0,
        }
    }

    /// The standard plain-text compound: both extraction modes registered,
    /// line mode active.
    pub fn plain_text() -> Self {
        let mut filter = CompoundFilter::new("plaintext");
        filter.register(
            SubFormat::Lines,
            Box::new(PlainTextFilter::new(
                PlainTextOptions::new().with_mode(ExtractionMode::Lines),
            )),
        );
        filter.register(
            SubFormat::Paragraphs,
            Box::new(PlainTextFilter::new(
                PlainTextOptions::new().with_mode(ExtractionMode::Paragraphs),
            )),
        );
        filter
    }

    /// Registers a sibling reader for a sub-format, replacing any reader
    /// previously registered under the same key. The first registration
    /// becomes the active one.
    pub fn register(&mut self, sub_format: SubFormat, filter: Box<dyn Filter>) {
        match self.position(sub_format) {
            Some(index) => self.siblings[index].1 = filter,
            None => self.siblings.push((sub_format, filter)),
        }
    }

    /// Makes a registered sub-format the delegation target.
    pub fn activate(&mut self, sub_format: SubFormat) -> Result<(), Error> {
        match self.position(sub_format) {
            Some(index) => {
                self.active = index;
                Ok(())
            }
            None => Err(Error::bad_input(format!(
                "sub-format `{sub_format}` is not registered"
            ))),
        }
    }

    /// The active sub-format, if any reader is registered.
    pub fn active(&self) -> Option<SubFormat> {
        self.siblings.get(self.active).map(|(key, _)| *key)
    }

    /// The registered sub-formats, in registration order.
    pub fn sub_formats(&self) -> impl Iterator<Item = SubFormat> + '_ {
        self.siblings.iter().map(|(key, _)| *key)
    }

    /// The parameters reported for this configuration.
    pub fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        if let Some(active) = self.active() {
            params.set("subFormat", active.label());
        }
        params
    }

    fn position(&self, sub_format: SubFormat) -> Option<usize> {
        self.siblings.iter().position(|(key, _)| *key == sub_format)
    }

    fn active_filter(&self) -> Option<&dyn Filter> {
        self.siblings
            .get(self.active)
            .map(|(_, filter)| filter.as_ref())
    }

    fn active_filter_mut(&mut self) -> Option<&mut Box<dyn Filter>> {
        self.siblings.get_mut(self.active).map(|(_, filter)| filter)
    }
}

impl Filter for CompoundFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_with(&mut self, input: RawDocument, generate_skeleton: bool) -> Result<(), Error> {
        match self.active_filter_mut() {
            Some(filter) => filter.open_with(input, generate_skeleton),
            None => Err(Error::bad_input(
                "compound filter has no registered sub-format",
            )),
        }
    }

    fn close(&mut self) {
        if let Some(filter) = self.active_filter_mut() {
            filter.close();
        }
    }

    fn cancel(&mut self) {
        if let Some(filter) = self.active_filter_mut() {
            filter.cancel();
        }
    }

    fn has_next(&mut self) -> bool {
        match self.active_filter_mut() {
            Some(filter) => filter.has_next(),
            None => false,
        }
    }

    fn next_event(&mut self) -> Result<Event, Error> {
        let Some(filter) = self.active_filter_mut() else {
            return Err(Error::NoSuchElement);
        };
        let mut event = filter.next_event()?;
        if let Event::StartDocument(start) = &mut event {
            // Callers observe the compound configuration, not the sibling.
            start.filter_id = self.name.clone();
            start.parameters = Some(self.parameters());
        }
        Ok(event)
    }

    fn create_filter_writer(&self) -> Box<dyn FilterWriter> {
        Box::new(GenericFilterWriter::new(
            self.create_skeleton_writer(),
            self.name(),
        ))
    }

    fn create_skeleton_writer(&self) -> Box<dyn SkeletonWriter> {
        match self.active_filter() {
            Some(filter) => filter.create_skeleton_writer(),
            None => Box::new(GenericSkeletonWriter::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::locale::LocaleId;

    fn en() -> LocaleId {
        LocaleId::new("en").unwrap()
    }

    fn drain(filter: &mut CompoundFilter) -> Vec<Event> {
        let mut events = Vec::new();
        while filter.has_next() {
            events.push(filter.next_event().unwrap());
        }
        events
    }

    #[test]
    fn test_start_document_reports_compound_identity() {
        let mut filter = CompoundFilter::plain_text();
        filter.open(RawDocument::new("Hello\n", en())).unwrap();
        let events = drain(&mut filter);

        let Event::StartDocument(start) = &events[0] else {
            panic!("expected START_DOCUMENT first");
        };
        assert_eq!(start.filter_id, "plaintext");
        let params = start.parameters.as_ref().unwrap();
        assert_eq!(params.get("subFormat"), Some("lines"));
        // The sibling's own parameters are replaced wholesale.
        assert_eq!(params.get("mode"), None);
    }

    #[test]
    fn test_activation_changes_dispatch() {
        let content = "one\ntwo\n\nthree\n";
        let mut filter = CompoundFilter::plain_text();
        assert_eq!(filter.active(), Some(SubFormat::Lines));

        filter.open(RawDocument::new(content, en())).unwrap();
        let units = drain(&mut filter)
            .iter()
            .filter(|event| event.kind() == EventKind::TextUnit)
            .count();
        assert_eq!(units, 3);
        filter.close();

        filter.activate(SubFormat::Paragraphs).unwrap();
        filter.open(RawDocument::new(content, en())).unwrap();
        let events = drain(&mut filter);
        let units = events
            .iter()
            .filter(|event| event.kind() == EventKind::TextUnit)
            .count();
        assert_eq!(units, 2);

        let Event::StartDocument(start) = &events[0] else {
            panic!("expected START_DOCUMENT first");
        };
        assert_eq!(start.filter_id, "plaintext");
        let params = start.parameters.as_ref().unwrap();
        assert_eq!(params.get("subFormat"), Some("paragraphs"));
    }

    #[test]
    fn test_empty_registry_behaves_like_closed_filter() {
        let mut filter = CompoundFilter::new("empty");
        assert_eq!(filter.active(), None);
        assert!(!filter.has_next());
        assert!(matches!(filter.next_event(), Err(Error::NoSuchElement)));
        assert!(filter.open(RawDocument::new("x", en())).is_err());
        assert!(filter.activate(SubFormat::Lines).is_err());
    }

    #[test]
    fn test_cancel_forwards_to_active_sibling() {
        let mut filter = CompoundFilter::plain_text();
        filter.open(RawDocument::new("a\nb\nc\n", en())).unwrap();
        assert!(filter.has_next());
        filter.next_event().unwrap();

        filter.cancel();
        assert!(!filter.has_next());
        assert!(matches!(filter.next_event(), Ok(Event::Canceled)));
        assert!(matches!(filter.next_event(), Err(Error::NoSuchElement)));
    }

    #[test]
    fn test_register_replaces_existing_key() {
        let mut filter = CompoundFilter::plain_text();
        filter.register(
            SubFormat::Lines,
            Box::new(PlainTextFilter::new(
                PlainTextOptions::new().with_extract_placeholders(false),
            )),
        );
        assert_eq!(filter.sub_formats().count(), 2);
        assert_eq!(filter.active(), Some(SubFormat::Lines));
    }

    #[test]
    fn test_writer_factories_come_from_active_sibling() {
        let filter = CompoundFilter::plain_text();
        let mut writer = filter.create_skeleton_writer();
        // A usable writer from the sibling, not a panic on delegation.
        writer.close();
    }
}
