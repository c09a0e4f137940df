//! Output escaping seam.
//!
//! Format-specific writers escape extracted text on the way back out (XML
//! entities, properties-file backslashes, and so on). The skeleton writer
//! owns one [`Encoder`] and runs every literal text run and property value
//! through it; skeleton literals and inline-code data are original bytes
//! and bypass it.

use std::borrow::Cow;
use std::fmt::Debug;

/// Escapes extracted text for a concrete output format.
pub trait Encoder: Debug {
    /// Escapes a run of literal text.
    fn encode<'t>(&self, text: &'t str) -> Cow<'t, str>;

    /// Escapes a single character.
    fn encode_char(&self, c: char) -> String {
        self.encode(c.encode_utf8(&mut [0u8; 4])).into_owned()
    }

    /// Escapes a property value; defaults to the text rules.
    fn encode_property(&self, name: &str, value: &str) -> String {
        let _ = name;
        self.encode(value).into_owned()
    }
}

/// Pass-through encoder for formats with no escaping rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEncoder;

impl Encoder for PlainEncoder {
    fn encode<'t>(&self, text: &'t str) -> Cow<'t, str> {
        Cow::Borrowed(text)
    }
}
