#![forbid(unsafe_code)]
//! Localization-extraction toolkit: coded text, filter events, and
//! verbatim output reconstruction.
//!
//! A [`Filter`](filter::Filter) reads one document and yields a stream of
//! [`Event`]s: the translatable text as [`TextFragment`]s (inline markup
//! lifted into id-tagged [`Code`]s), everything else as skeleton chunks.
//! Replaying the stream through a filter writer reproduces the original
//! document byte for byte; merging translated fragments back in produces
//! the localized one. An [`InlineCodeChecker`](checker::InlineCodeChecker)
//! verifies that translations kept their codes intact.
//!
//! # Quick Start
//!
//! ```rust
//! use locfilter::filter::{Filter, RawDocument};
//! use locfilter::filters::plaintext::PlainTextFilter;
//! use locfilter::{Event, LocaleId};
//!
//! let mut filter = PlainTextFilter::default();
//! filter.open(RawDocument::new("Hello %s\nBye\n", LocaleId::new("en")?))?;
//!
//! let mut events = Vec::new();
//! while filter.has_next() {
//!     events.push(filter.next_event()?);
//! }
//! filter.close();
//!
//! // Two text units; the %s placeholder became an inline code.
//! let units: Vec<_> = events
//!     .iter()
//!     .filter_map(|event| match event {
//!         Event::TextUnit(unit) => Some(unit),
//!         _ => None,
//!     })
//!     .collect();
//! assert_eq!(units.len(), 2);
//! assert!(units[0].content.parts()[0].content.has_codes());
//! # Ok::<(), locfilter::Error>(())
//! ```
//!
//! # Model
//!
//! - [`TextFragment`]: text with embedded 2-char code markers plus a code
//!   table; positions convert between fragment, original, and generic
//!   coordinate spaces through [`CodedTextView`](fragment::CodedTextView).
//! - [`TextContainer`]: a segmented source plus aligned target part
//!   sequences per locale.
//! - [`Event`]: the closed set of stream resources, from `START_DOCUMENT`
//!   to `END_DOCUMENT`, serializable as JSON for caching.
//! - [`Skeleton`]: typed parts (literal text, content and value
//!   references) that a skeleton writer resolves back into output.

pub mod checker;
pub mod container;
pub mod encoder;
pub mod error;
pub mod event;
pub mod filter;
pub mod filters;
pub mod fragment;
pub mod locale;
pub mod params;
pub mod resource;
pub mod skeleton;
pub mod writer;

// Re-export most used types for easy consumption
pub use crate::{
    container::{TargetBuilding, TextContainer, TextPart},
    error::Error,
    event::{Event, EventKind},
    fragment::{Code, CoordSpace, TagType, TextFragment},
    locale::LocaleId,
    params::Parameters,
    skeleton::Skeleton,
};
