//! Events produced by filters: one tagged variant per resource kind, so a
//! `match` covers the whole stream shape and the compiler flags any handler
//! that forgets a case.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::resource::{
    CustomResource, DocumentPart, Ending, StartDocument, StartGroup, StartSubDocument, TextUnit,
};

/// The kind of an [`Event`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    StartDocument,
    EndDocument,
    StartSubDocument,
    EndSubDocument,
    StartGroup,
    EndGroup,
    TextUnit,
    DocumentPart,
    Custom,
    Canceled,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::StartDocument => "START_DOCUMENT",
            EventKind::EndDocument => "END_DOCUMENT",
            EventKind::StartSubDocument => "START_SUBDOCUMENT",
            EventKind::EndSubDocument => "END_SUBDOCUMENT",
            EventKind::StartGroup => "START_GROUP",
            EventKind::EndGroup => "END_GROUP",
            EventKind::TextUnit => "TEXT_UNIT",
            EventKind::DocumentPart => "DOCUMENT_PART",
            EventKind::Custom => "CUSTOM",
            EventKind::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// One unit of the extraction stream.
///
/// A well-formed stream opens with `StartDocument`, closes with
/// `EndDocument`, and nests sub-documents and groups properly in between.
/// `Canceled` is terminal: it appears at most once, as the last event after
/// a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resource", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    StartDocument(StartDocument),
    EndDocument(Ending),
    StartSubDocument(StartSubDocument),
    EndSubDocument(Ending),
    StartGroup(StartGroup),
    EndGroup(Ending),
    TextUnit(TextUnit),
    DocumentPart(DocumentPart),
    Custom(CustomResource),
    Canceled,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StartDocument(_) => EventKind::StartDocument,
            Event::EndDocument(_) => EventKind::EndDocument,
            Event::StartSubDocument(_) => EventKind::StartSubDocument,
            Event::EndSubDocument(_) => EventKind::EndSubDocument,
            Event::StartGroup(_) => EventKind::StartGroup,
            Event::EndGroup(_) => EventKind::EndGroup,
            Event::TextUnit(_) => EventKind::TextUnit,
            Event::DocumentPart(_) => EventKind::DocumentPart,
            Event::Custom(_) => EventKind::Custom,
            Event::Canceled => EventKind::Canceled,
        }
    }

    /// The id of the carried resource; `None` for `Canceled`.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Event::StartDocument(r) => Some(&r.id),
            Event::EndDocument(r) => Some(&r.id),
            Event::StartSubDocument(r) => Some(&r.id),
            Event::EndSubDocument(r) => Some(&r.id),
            Event::StartGroup(r) => Some(&r.id),
            Event::EndGroup(r) => Some(&r.id),
            Event::TextUnit(r) => Some(&r.id),
            Event::DocumentPart(r) => Some(&r.id),
            Event::Custom(r) => Some(&r.id),
            Event::Canceled => None,
        }
    }

    pub fn is_text_unit(&self) -> bool {
        matches!(self, Event::TextUnit(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Event::Canceled)
    }

    pub fn as_start_document(&self) -> Option<&StartDocument> {
        match self {
            Event::StartDocument(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_text_unit(&self) -> Option<&TextUnit> {
        match self {
            Event::TextUnit(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_text_unit_mut(&mut self) -> Option<&mut TextUnit> {
        match self {
            Event::TextUnit(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_document_part(&self) -> Option<&DocumentPart> {
        match self {
            Event::DocumentPart(r) => Some(r),
            _ => None,
        }
    }

    /// Takes the text unit out of the event, handing the event back
    /// unchanged when it holds something else.
    pub fn into_text_unit(self) -> Result<TextUnit, Event> {
        match self {
            Event::TextUnit(r) => Ok(r),
            other => Err(other),
        }
    }
}

/// Serializes a recorded event stream to pretty-printed JSON.
pub fn events_to_json(events: &[Event]) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(events)?)
}

/// Reads back an event stream written by [`events_to_json`].
pub fn events_from_json(json: &str) -> Result<Vec<Event>, Error> {
    Ok(serde_json::from_str(json)?)
}
