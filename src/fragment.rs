//! Coded-text fragments: the atomic unit of translatable content.
//!
//! A [`TextFragment`] is a text buffer in which each piece of inline markup
//! is replaced by a two-character *code marker* (a role character plus an
//! index character), paired with a code table mapping markers to [`Code`]
//! values. Three coordinate spaces exist over one fragment:
//!
//! - **fragment** space: offsets into the marker-bearing buffer, where every
//!   code occupies exactly 2 positions;
//! - **original** space: offsets into the fully expanded text, where every
//!   code occupies its raw data's natural length;
//! - **generic** space: offsets into a normalized rendering where every code
//!   occupies its generic label (`<1>`, `</1>`, `<2/>`).
//!
//! Conversions between spaces are pure functions over a [`CodedTextView`];
//! they are exact, order-preserving, and mutually inverse at any position
//! that is not strictly inside one code's own span.
//!
//! Marker characters live in the Unicode private-use area (U+E101..U+E103
//! for roles, U+E110 and up for indices); they are reserved and must not
//! appear in document text fed to [`TextFragment::append_text`].

use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Marker character for an opening code.
pub const MARKER_OPENING: char = '\u{E101}';
/// Marker character for a closing code.
pub const MARKER_CLOSING: char = '\u{E102}';
/// Marker character for an isolated (placeholder) code.
pub const MARKER_ISOLATED: char = '\u{E103}';

const INDEX_BASE: u32 = 0xE110;

/// Maximum number of inline codes one fragment can hold; bounded by the
/// private-use range available for index characters.
pub const MAX_INLINE_CODES: usize = 6127;

pub(crate) fn index_to_char(index: usize) -> char {
    // callers guarantee index < MAX_INLINE_CODES
    char::from_u32(INDEX_BASE + index as u32).unwrap_or('\u{FFFD}')
}

pub(crate) fn char_to_index(c: char) -> Option<usize> {
    let value = c as u32;
    if (INDEX_BASE..INDEX_BASE + MAX_INLINE_CODES as u32).contains(&value) {
        Some((value - INDEX_BASE) as usize)
    } else {
        None
    }
}

fn marker_char(tag_type: TagType) -> char {
    match tag_type {
        TagType::Opening => MARKER_OPENING,
        TagType::Closing => MARKER_CLOSING,
        TagType::Placeholder => MARKER_ISOLATED,
    }
}

fn is_marker_char(c: char) -> bool {
    matches!(c, MARKER_OPENING | MARKER_CLOSING | MARKER_ISOLATED)
}

/// The role an inline code plays in the surrounding markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    /// Start of a paired span, e.g. `<b>`.
    Opening,
    /// End of a paired span, e.g. `</b>`.
    Closing,
    /// Self-contained markup, e.g. `<br/>` or `%s`.
    Placeholder,
}

impl Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TagType::Opening => "OPENING",
            TagType::Closing => "CLOSING",
            TagType::Placeholder => "PLACEHOLDER",
        };
        write!(f, "{}", name)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An inline code: a tagged, identified placeholder for non-text content
/// embedded in extractable text.
///
/// Within one fragment ids are unique, except that an [`TagType::Opening`]
/// code and its matching [`TagType::Closing`] code share one id. Ids below
/// zero mean "not yet assigned"; the fragment assigns an id when the code is
/// appended.
///
/// # Example
///
/// ```rust
/// use locfilter::{Code, TagType};
///
/// let code = Code::new(TagType::Placeholder, "lb", "<br/>")
///     .with_id(2)
///     .with_deleteable(true);
/// assert!(code.deleteable);
/// assert_eq!(code.generic_display(), "<2/>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    /// Numeric id, unique within one fragment (pairs share one id).
    pub id: i32,
    /// Identifier the code had in the original document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// Role of the code in the surrounding markup.
    pub tag_type: TagType,
    /// Free-form type label, e.g. `"bold"` or `"x-placeholder"`. Empty means
    /// untyped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_type: String,
    /// The literal non-extracted substring the code stands for. May be empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Whether the code may be dropped from a target without error.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleteable: bool,
    /// Whether the code may be duplicated in a target.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cloneable: bool,
}

impl Code {
    /// Id value of a code that has not been appended to a fragment yet.
    pub const UNASSIGNED_ID: i32 = -1;

    /// Creates a code with an unassigned id.
    pub fn new(
        tag_type: TagType,
        code_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Code {
            id: Code::UNASSIGNED_ID,
            original_id: None,
            tag_type,
            code_type: code_type.into(),
            data: data.into(),
            deleteable: false,
            cloneable: false,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.original_id = Some(original_id.into());
        self
    }

    pub fn with_deleteable(mut self, deleteable: bool) -> Self {
        self.deleteable = deleteable;
        self
    }

    pub fn with_cloneable(mut self, cloneable: bool) -> Self {
        self.cloneable = cloneable;
        self
    }

    /// The normalized rendering of this code, independent of its raw data:
    /// `<id>` for opening, `</id>` for closing, `<id/>` for placeholders.
    pub fn generic_display(&self) -> String {
        match self.tag_type {
            TagType::Opening => format!("<{}>", self.id),
            TagType::Closing => format!("</{}>", self.id),
            TagType::Placeholder => format!("<{}/>", self.id),
        }
    }
}

/// The coordinate spaces defined over one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordSpace {
    /// Marker-bearing buffer; each code occupies 2 positions.
    Fragment,
    /// Fully expanded text; each code occupies its data's length.
    Original,
    /// Normalized rendering; each code occupies its generic label.
    Generic,
}

enum Chunk<'a> {
    Char(char),
    Code { index: usize, code: &'a Code },
}

impl Chunk<'_> {
    fn width_in(&self, space: CoordSpace) -> usize {
        match self {
            Chunk::Char(_) => 1,
            Chunk::Code { code, .. } => match space {
                CoordSpace::Fragment => 2,
                CoordSpace::Original => code.data.chars().count(),
                CoordSpace::Generic => code.generic_display().chars().count(),
            },
        }
    }
}

struct Chunks<'a> {
    chars: std::str::Chars<'a>,
    codes: &'a [Code],
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let c = self.chars.next()?;
        if is_marker_char(c) {
            // A marker is only a marker when followed by a resolvable index
            // character; anything else is treated as literal text and left
            // for `validate` to flag.
            let mut ahead = self.chars.clone();
            if let Some(index_char) = ahead.next()
                && let Some(index) = char_to_index(index_char)
                && index < self.codes.len()
            {
                self.chars = ahead;
                return Some(Chunk::Code {
                    index,
                    code: &self.codes[index],
                });
            }
        }
        Some(Chunk::Char(c))
    }
}

/// An immutable view of a fragment's coded text plus its code table.
///
/// All coordinate arithmetic lives here, as pure functions: a view never
/// mutates anything and a code never needs to know its container.
#[derive(Debug, Clone, Copy)]
pub struct CodedTextView<'a> {
    text: &'a str,
    codes: &'a [Code],
}

impl<'a> CodedTextView<'a> {
    pub fn new(text: &'a str, codes: &'a [Code]) -> Self {
        CodedTextView { text, codes }
    }

    fn chunks(&self) -> Chunks<'a> {
        Chunks {
            chars: self.text.chars(),
            codes: self.codes,
        }
    }

    /// Length of the fragment in the given coordinate space.
    pub fn len_in(&self, space: CoordSpace) -> usize {
        self.chunks().map(|chunk| chunk.width_in(space)).sum()
    }

    /// Maps a position from one coordinate space to another.
    ///
    /// Positions are boundaries between units, so `0..=len` are valid inputs.
    /// Fails with [`Error::PositionOutOfRange`] when the position exceeds the
    /// source-space length, or falls strictly inside one code's span where
    /// the conversion is ambiguous. When a code spans zero width in the
    /// source space (empty raw data in original space), the earliest
    /// coinciding boundary wins.
    pub fn map_position(
        &self,
        position: usize,
        from: CoordSpace,
        to: CoordSpace,
    ) -> Result<usize, Error> {
        let mut src = 0usize;
        let mut dst = 0usize;
        for chunk in self.chunks() {
            if src == position {
                return Ok(dst);
            }
            let src_width = chunk.width_in(from);
            if position < src + src_width {
                // strictly inside this unit's span
                return Err(Error::position_out_of_range(position, self.len_in(from)));
            }
            src += src_width;
            dst += chunk.width_in(to);
        }
        if src == position {
            Ok(dst)
        } else {
            Err(Error::position_out_of_range(position, src))
        }
    }

    /// The codes in textual order, each with its fragment-space position
    /// (the position of its marker's first element).
    pub fn ordered_codes(&self) -> Vec<(usize, &'a Code)> {
        self.ordered_codes_in(CoordSpace::Fragment)
    }

    /// The codes in textual order, each with its start position expressed
    /// in the given coordinate space.
    pub fn ordered_codes_in(&self, space: CoordSpace) -> Vec<(usize, &'a Code)> {
        let mut result = Vec::new();
        let mut position = 0usize;
        for chunk in self.chunks() {
            if let Chunk::Code { code, .. } = chunk {
                result.push((position, code));
            }
            position += chunk.width_in(space);
        }
        result
    }
}

/// A string with embedded code markers plus its code table.
///
/// # Example
///
/// ```rust
/// use locfilter::{CoordSpace, TagType, TextFragment};
///
/// let mut fragment = TextFragment::new();
/// fragment.append_text("Press ");
/// fragment.append_code(TagType::Opening, "b", "<b>")?;
/// fragment.append_text("Enter");
/// fragment.append_code(TagType::Closing, "b", "</b>")?;
/// assert_eq!(fragment.to_text(), "Press <b>Enter</b>");
/// assert_eq!(fragment.to_plain_text(), "Press Enter");
/// assert_eq!(fragment.to_generic_text(), "Press <1>Enter</1>");
/// # Ok::<(), locfilter::Error>(())
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextFragment {
    text: String,
    codes: Vec<Code>,
    last_auto_id: i32,
}

impl TextFragment {
    /// Creates an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembles a fragment from a coded-text buffer and its code table,
    /// validating the pair.
    pub fn from_coded(text: String, codes: Vec<Code>) -> Result<Self, Error> {
        let last_auto_id = codes.iter().map(|c| c.id).max().unwrap_or(0);
        let fragment = TextFragment {
            text,
            codes,
            last_auto_id,
        };
        fragment.validate()?;
        Ok(fragment)
    }

    /// The raw marker-bearing buffer.
    pub fn coded_text(&self) -> &str {
        &self.text
    }

    /// The code table, in marker-index order (not necessarily textual order).
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    /// An immutable view for coordinate arithmetic.
    pub fn view(&self) -> CodedTextView<'_> {
        CodedTextView::new(&self.text, &self.codes)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the fragment contains any inline codes.
    pub fn has_codes(&self) -> bool {
        !self.codes.is_empty()
    }

    /// Length in the given coordinate space.
    pub fn len_in(&self, space: CoordSpace) -> usize {
        self.view().len_in(space)
    }

    /// Maps a position between coordinate spaces. See
    /// [`CodedTextView::map_position`].
    pub fn map_position(
        &self,
        position: usize,
        from: CoordSpace,
        to: CoordSpace,
    ) -> Result<usize, Error> {
        self.view().map_position(position, from, to)
    }

    /// Appends literal text. Marker characters are reserved and must not
    /// occur in `text`.
    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.codes.clear();
        self.last_auto_id = 0;
    }

    /// Appends a code at the end of the fragment.
    ///
    /// An unassigned id is resolved here: closing codes reuse the id of the
    /// last unmatched opening code with the same type label, everything else
    /// gets the next free id (auto ids start at 1). An explicit id is
    /// validated against the uniqueness invariant.
    pub fn append(&mut self, code: Code) -> Result<i32, Error> {
        let code = self.admit(code)?;
        let index = self.codes.len();
        self.text.push(marker_char(code.tag_type));
        self.text.push(index_to_char(index));
        let id = code.id;
        self.codes.push(code);
        Ok(id)
    }

    /// Appends a code built from its parts; returns the assigned id.
    pub fn append_code(
        &mut self,
        tag_type: TagType,
        code_type: &str,
        data: &str,
    ) -> Result<i32, Error> {
        self.append(Code::new(tag_type, code_type, data))
    }

    /// Appends a code with an explicit id.
    pub fn append_code_with_id(
        &mut self,
        tag_type: TagType,
        code_type: &str,
        data: &str,
        id: i32,
    ) -> Result<i32, Error> {
        self.append(Code::new(tag_type, code_type, data).with_id(id))
    }

    /// Inserts a code at a fragment-space position.
    ///
    /// Fails with [`Error::PositionOutOfRange`] when the position falls
    /// strictly inside an existing marker.
    pub fn insert_code(&mut self, position: usize, code: Code) -> Result<i32, Error> {
        let byte = self.byte_offset_at(position)?;
        let code = self.admit(code)?;
        let index = self.codes.len();
        let mut marker = String::with_capacity(8);
        marker.push(marker_char(code.tag_type));
        marker.push(index_to_char(index));
        self.text.insert_str(byte, &marker);
        let id = code.id;
        self.codes.push(code);
        Ok(id)
    }

    /// First code (in textual order) with the given id.
    pub fn code_by_id(&self, id: i32) -> Option<&Code> {
        self.view()
            .ordered_codes()
            .into_iter()
            .map(|(_, code)| code)
            .find(|code| code.id == id)
    }

    pub fn has_code(&self, id: i32) -> bool {
        self.codes.iter().any(|code| code.id == id)
    }

    /// Mutable access to the first code (in textual order) with the given id.
    pub fn code_mut(&mut self, id: i32) -> Option<&mut Code> {
        let index = {
            let view = self.view();
            let ordered = view.ordered_codes();
            let target = ordered.iter().find(|(_, code)| code.id == id)?;
            self.codes
                .iter()
                .position(|code| std::ptr::eq(code, target.1))?
        };
        self.codes.get_mut(index)
    }

    /// Replaces the first code (in textual order) carrying `id`. The
    /// replacement keeps that id and the existing marker position; only the
    /// payload changes.
    pub fn replace_code(&mut self, id: i32, mut code: Code) -> Result<(), Error> {
        code.id = id;
        match self.code_mut(id) {
            Some(slot) => {
                // the marker's role character stays what it was
                code.tag_type = slot.tag_type;
                *slot = code;
                Ok(())
            }
            None => Err(Error::bad_input(format!("no inline code with id {}", id))),
        }
    }

    /// Removes every marker carrying the given id (an opening/closing pair
    /// goes together) and drops the matching table entries. Returns whether
    /// anything was removed.
    pub fn remove_code(&mut self, id: i32) -> bool {
        if !self.has_code(id) {
            return false;
        }
        let (text, codes) = rebuild(&self.text, &self.codes, |code| code.id != id);
        self.text = text;
        self.codes = codes;
        true
    }

    /// Appends another fragment, merging its code table into this one.
    ///
    /// Appended codes keep their ids unless an id is already used here, in
    /// which case all of the appended fragment's codes sharing that id are
    /// renumbered together to the next free id.
    pub fn append_fragment(&mut self, other: &TextFragment) -> Result<(), Error> {
        if self.codes.len() + other.codes.len() > MAX_INLINE_CODES {
            return Err(Error::bad_input(format!(
                "too many inline codes in fragment (max {})",
                MAX_INLINE_CODES
            )));
        }
        let mut remap: HashMap<i32, i32> = HashMap::new();
        for code in &other.codes {
            if self.has_code(code.id) && !remap.contains_key(&code.id) {
                let fresh = self.fresh_id_with(&remap);
                remap.insert(code.id, fresh);
            }
        }
        let base = self.codes.len();
        let view = CodedTextView::new(&other.text, &other.codes);
        let mut appended_text = String::with_capacity(other.text.len());
        let mut appended_codes: Vec<Code> = Vec::with_capacity(other.codes.len());
        for chunk in view.chunks() {
            match chunk {
                Chunk::Char(c) => appended_text.push(c),
                Chunk::Code { code, .. } => {
                    let mut code = code.clone();
                    if let Some(new_id) = remap.get(&code.id) {
                        code.id = *new_id;
                    }
                    appended_text.push(marker_char(code.tag_type));
                    appended_text.push(index_to_char(base + appended_codes.len()));
                    appended_codes.push(code);
                }
            }
        }
        self.text.push_str(&appended_text);
        self.codes.extend(appended_codes);
        self.last_auto_id = self
            .last_auto_id
            .max(self.codes.iter().map(|c| c.id).max().unwrap_or(0));
        Ok(())
    }

    /// Splits the fragment at a fragment-space position, leaving `0..position`
    /// here and returning `position..`. Codes move with their markers; both
    /// halves get consistently reindexed tables.
    pub fn split_off(&mut self, position: usize) -> Result<TextFragment, Error> {
        let byte = self.byte_offset_at(position)?;
        let right_raw = self.text[byte..].to_string();
        let left_raw = self.text[..byte].to_string();
        let (left_text, left_codes) = rebuild(&left_raw, &self.codes, |_| true);
        let (right_text, right_codes) = rebuild(&right_raw, &self.codes, |_| true);
        self.text = left_text;
        self.codes = left_codes;
        Ok(TextFragment {
            text: right_text,
            codes: right_codes,
            last_auto_id: self.last_auto_id,
        })
    }

    /// Plain text with all codes dropped.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        for chunk in self.view().chunks() {
            if let Chunk::Char(c) = chunk {
                out.push(c);
            }
        }
        out
    }

    /// Text with each code expanded to its raw data (the original-space
    /// rendering).
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        for chunk in self.view().chunks() {
            match chunk {
                Chunk::Char(c) => out.push(c),
                Chunk::Code { code, .. } => out.push_str(&code.data),
            }
        }
        out
    }

    /// Like [`to_text`](Self::to_text), with `escape` applied to each run of
    /// literal text; code data passes through untouched.
    pub fn to_text_with<F>(&self, mut escape: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::with_capacity(self.text.len());
        let mut run = String::new();
        for chunk in self.view().chunks() {
            match chunk {
                Chunk::Char(c) => run.push(c),
                Chunk::Code { code, .. } => {
                    if !run.is_empty() {
                        out.push_str(&escape(&run));
                        run.clear();
                    }
                    out.push_str(&code.data);
                }
            }
        }
        if !run.is_empty() {
            out.push_str(&escape(&run));
        }
        out
    }

    /// Text with each code rendered as its generic label (the generic-space
    /// rendering).
    pub fn to_generic_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        for chunk in self.view().chunks() {
            match chunk {
                Chunk::Char(c) => out.push(c),
                Chunk::Code { code, .. } => out.push_str(&code.generic_display()),
            }
        }
        out
    }

    /// Checks the marker/table invariant: every marker resolves to exactly
    /// one table entry whose role matches the marker, no table entry is
    /// left unreferenced, and every id is assigned and shared only by an
    /// opening/closing pair.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = vec![false; self.codes.len()];
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if !is_marker_char(c) {
                if char_to_index(c).is_some() {
                    return Err(Error::bad_input(
                        "stray index character outside a code marker".to_string(),
                    ));
                }
                continue;
            }
            let index = chars
                .next()
                .and_then(char_to_index)
                .ok_or_else(|| Error::bad_input("truncated code marker".to_string()))?;
            let code = self.codes.get(index).ok_or_else(|| {
                Error::bad_input(format!("marker references missing code index {}", index))
            })?;
            if marker_char(code.tag_type) != c {
                return Err(Error::bad_input(format!(
                    "marker role does not match code {} ({})",
                    code.id, code.tag_type
                )));
            }
            if seen[index] {
                return Err(Error::bad_input(format!(
                    "code index {} referenced by more than one marker",
                    index
                )));
            }
            seen[index] = true;
        }
        if let Some(index) = seen.iter().position(|s| !s) {
            return Err(Error::bad_input(format!(
                "orphan code table entry at index {} (id {})",
                index, self.codes[index].id
            )));
        }
        for (index, code) in self.codes.iter().enumerate() {
            if code.id < 0 {
                return Err(Error::bad_input(format!(
                    "unassigned id on code table entry {}",
                    index
                )));
            }
            for other in &self.codes[index + 1..] {
                if other.id != code.id {
                    continue;
                }
                let pairs = matches!(
                    (code.tag_type, other.tag_type),
                    (TagType::Opening, TagType::Closing) | (TagType::Closing, TagType::Opening)
                );
                if !pairs {
                    return Err(Error::bad_input(format!(
                        "duplicate inline-code id {} ({} vs {})",
                        code.id, code.tag_type, other.tag_type
                    )));
                }
            }
        }
        Ok(())
    }

    fn admit(&mut self, mut code: Code) -> Result<Code, Error> {
        if self.codes.len() >= MAX_INLINE_CODES {
            return Err(Error::bad_input(format!(
                "too many inline codes in fragment (max {})",
                MAX_INLINE_CODES
            )));
        }
        if code.id < 0 {
            code.id = match code.tag_type {
                TagType::Closing => match self.matching_open_id(&code.code_type) {
                    Some(id) => id,
                    None => self.fresh_id(),
                },
                _ => self.fresh_id(),
            };
        } else {
            self.check_explicit_id(&code)?;
            if code.id > self.last_auto_id {
                self.last_auto_id = code.id;
            }
        }
        Ok(code)
    }

    fn fresh_id(&mut self) -> i32 {
        let mut id = self.last_auto_id + 1;
        while self.codes.iter().any(|code| code.id == id) {
            id += 1;
        }
        self.last_auto_id = id;
        id
    }

    fn fresh_id_with(&mut self, pending: &HashMap<i32, i32>) -> i32 {
        let mut id = self.last_auto_id + 1;
        while self.codes.iter().any(|code| code.id == id)
            || pending.values().any(|assigned| *assigned == id)
        {
            id += 1;
        }
        self.last_auto_id = id;
        id
    }

    fn matching_open_id(&self, code_type: &str) -> Option<i32> {
        let mut stack: Vec<i32> = Vec::new();
        for (_, code) in self.view().ordered_codes() {
            if code.code_type != code_type {
                continue;
            }
            match code.tag_type {
                TagType::Opening => stack.push(code.id),
                TagType::Closing => {
                    stack.pop();
                }
                TagType::Placeholder => {}
            }
        }
        stack.last().copied()
    }

    fn check_explicit_id(&self, code: &Code) -> Result<(), Error> {
        for existing in &self.codes {
            if existing.id != code.id {
                continue;
            }
            let pairs = matches!(
                (existing.tag_type, code.tag_type),
                (TagType::Opening, TagType::Closing) | (TagType::Closing, TagType::Opening)
            );
            if !pairs {
                return Err(Error::bad_input(format!(
                    "duplicate inline-code id {} ({} vs {})",
                    code.id, existing.tag_type, code.tag_type
                )));
            }
        }
        Ok(())
    }

    /// Byte offset of the unit boundary at a fragment-space position.
    fn byte_offset_at(&self, position: usize) -> Result<usize, Error> {
        let mut frag = 0usize;
        let mut byte = 0usize;
        let view = self.view();
        for chunk in view.chunks() {
            if frag == position {
                return Ok(byte);
            }
            let width = chunk.width_in(CoordSpace::Fragment);
            if position < frag + width {
                return Err(Error::position_out_of_range(
                    position,
                    view.len_in(CoordSpace::Fragment),
                ));
            }
            frag += width;
            byte += match chunk {
                Chunk::Char(c) => c.len_utf8(),
                Chunk::Code { index, code } => {
                    marker_char(code.tag_type).len_utf8() + index_to_char(index).len_utf8()
                }
            };
        }
        if frag == position {
            Ok(byte)
        } else {
            Err(Error::position_out_of_range(position, frag))
        }
    }
}

impl PartialEq for TextFragment {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.codes == other.codes
    }
}

impl Eq for TextFragment {}

impl Display for TextFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for TextFragment {
    fn from(text: &str) -> Self {
        let mut fragment = TextFragment::new();
        fragment.append_text(text);
        fragment
    }
}

impl From<String> for TextFragment {
    fn from(text: String) -> Self {
        TextFragment {
            text,
            codes: Vec::new(),
            last_auto_id: 0,
        }
    }
}

/// Rebuilds a coded-text/table pair keeping only codes accepted by `keep`,
/// reindexing the surviving markers.
fn rebuild(text: &str, codes: &[Code], keep: impl Fn(&Code) -> bool) -> (String, Vec<Code>) {
    let view = CodedTextView::new(text, codes);
    let mut new_text = String::with_capacity(text.len());
    let mut new_codes: Vec<Code> = Vec::with_capacity(codes.len());
    for chunk in view.chunks() {
        match chunk {
            Chunk::Char(c) => new_text.push(c),
            Chunk::Code { code, .. } => {
                if keep(code) {
                    new_text.push(marker_char(code.tag_type));
                    new_text.push(index_to_char(new_codes.len()));
                    new_codes.push(code.clone());
                }
            }
        }
    }
    (new_text, new_codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `abc<ph1/>def<ph2/>ghi` with two placeholder codes.
    fn two_placeholder_fragment() -> TextFragment {
        let mut fragment = TextFragment::new();
        fragment.append_text("abc");
        fragment
            .append_code(TagType::Placeholder, "ph", "<ph1/>")
            .unwrap();
        fragment.append_text("def");
        fragment
            .append_code(TagType::Placeholder, "ph", "<ph2/>")
            .unwrap();
        fragment.append_text("ghi");
        fragment
    }

    #[test]
    fn test_append_text_and_lengths() {
        let fragment = TextFragment::from("hello");
        assert_eq!(fragment.len_in(CoordSpace::Fragment), 5);
        assert_eq!(fragment.len_in(CoordSpace::Original), 5);
        assert_eq!(fragment.len_in(CoordSpace::Generic), 5);
        assert_eq!(fragment.to_text(), "hello");
    }

    #[test]
    fn test_auto_ids_start_at_one_and_increment() {
        let mut fragment = TextFragment::new();
        let first = fragment
            .append_code(TagType::Placeholder, "x", "%s")
            .unwrap();
        let second = fragment
            .append_code(TagType::Placeholder, "x", "%d")
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_closing_reuses_matching_opening_id() {
        let mut fragment = TextFragment::new();
        let bold = fragment.append_code(TagType::Opening, "bold", "<b>").unwrap();
        let italic = fragment
            .append_code(TagType::Opening, "italic", "<i>")
            .unwrap();
        let italic_end = fragment
            .append_code(TagType::Closing, "italic", "</i>")
            .unwrap();
        let bold_end = fragment
            .append_code(TagType::Closing, "bold", "</b>")
            .unwrap();
        assert_eq!(italic_end, italic);
        assert_eq!(bold_end, bold);
        assert_ne!(bold, italic);
    }

    #[test]
    fn test_unmatched_closing_gets_fresh_id() {
        let mut fragment = TextFragment::new();
        let id = fragment
            .append_code(TagType::Closing, "b", "</b>")
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_explicit_id_pair_allowed_duplicate_rejected() {
        let mut fragment = TextFragment::new();
        fragment
            .append_code_with_id(TagType::Opening, "b", "<b>", 7)
            .unwrap();
        fragment
            .append_code_with_id(TagType::Closing, "b", "</b>", 7)
            .unwrap();
        let duplicate = fragment.append_code_with_id(TagType::Opening, "i", "<i>", 7);
        assert!(matches!(duplicate, Err(Error::BadInput(_))));
        let clashing_placeholder =
            fragment.append_code_with_id(TagType::Placeholder, "x", "%s", 7);
        assert!(matches!(clashing_placeholder, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_marker_layout() {
        let fragment = two_placeholder_fragment();
        // 9 literal chars + 2 markers of 2 chars each
        assert_eq!(fragment.coded_text().chars().count(), 13);
        assert_eq!(fragment.len_in(CoordSpace::Fragment), 13);
        assert!(fragment.validate().is_ok());
    }

    #[test]
    fn test_renderings() {
        let fragment = two_placeholder_fragment();
        assert_eq!(fragment.to_plain_text(), "abcdefghi");
        assert_eq!(fragment.to_text(), "abc<ph1/>def<ph2/>ghi");
        assert_eq!(fragment.to_generic_text(), "abc<1/>def<2/>ghi");
        assert_eq!(fragment.to_string(), "abc<ph1/>def<ph2/>ghi");
    }

    #[test]
    fn test_to_text_with_escapes_literals_only() {
        let fragment = two_placeholder_fragment();
        let out = fragment.to_text_with(|run| run.to_uppercase());
        assert_eq!(out, "ABC<ph1/>DEF<ph2/>GHI");
    }

    #[test]
    fn test_fragment_to_generic_mapping() {
        let fragment = two_placeholder_fragment();
        let inputs = [2usize, 5, 6, 12];
        let expected = [2usize, 7, 8, 16];
        for (input, want) in inputs.iter().zip(expected.iter()) {
            let got = fragment
                .map_position(*input, CoordSpace::Fragment, CoordSpace::Generic)
                .unwrap();
            assert_eq!(got, *want, "fragment {} should map to generic {}", input, want);
        }
    }

    #[test]
    fn test_generic_to_fragment_mapping_is_inverse() {
        let fragment = two_placeholder_fragment();
        for position in [2usize, 7, 8, 16] {
            let back = fragment
                .map_position(position, CoordSpace::Generic, CoordSpace::Fragment)
                .unwrap();
            let forward = fragment
                .map_position(back, CoordSpace::Fragment, CoordSpace::Generic)
                .unwrap();
            assert_eq!(forward, position);
        }
    }

    #[test]
    fn test_fragment_to_original_mapping() {
        let fragment = two_placeholder_fragment();
        // each placeholder's data is 6 chars
        assert_eq!(
            fragment
                .map_position(5, CoordSpace::Fragment, CoordSpace::Original)
                .unwrap(),
            9
        );
        assert_eq!(
            fragment
                .map_position(12, CoordSpace::Fragment, CoordSpace::Original)
                .unwrap(),
            18
        );
        assert_eq!(fragment.len_in(CoordSpace::Original), 21);
    }

    #[test]
    fn test_mapping_inside_marker_fails() {
        let fragment = two_placeholder_fragment();
        let result = fragment.map_position(4, CoordSpace::Fragment, CoordSpace::Generic);
        assert!(matches!(
            result,
            Err(Error::PositionOutOfRange { position: 4, .. })
        ));
        let inside_label = fragment.map_position(5, CoordSpace::Generic, CoordSpace::Fragment);
        assert!(matches!(
            inside_label,
            Err(Error::PositionOutOfRange { position: 5, .. })
        ));
    }

    #[test]
    fn test_mapping_past_end_fails() {
        let fragment = TextFragment::from("ab");
        let result = fragment.map_position(3, CoordSpace::Fragment, CoordSpace::Generic);
        assert!(matches!(
            result,
            Err(Error::PositionOutOfRange {
                position: 3,
                len: 2
            })
        ));
    }

    #[test]
    fn test_end_position_maps_to_end() {
        let fragment = two_placeholder_fragment();
        assert_eq!(
            fragment
                .map_position(13, CoordSpace::Fragment, CoordSpace::Generic)
                .unwrap(),
            17
        );
    }

    #[test]
    fn test_empty_data_code_maps_to_earliest_boundary() {
        let mut fragment = TextFragment::new();
        fragment.append_text("ab");
        fragment.append_code(TagType::Placeholder, "x", "").unwrap();
        fragment.append_text("cd");
        // original space has a zero-width unit at position 2
        assert_eq!(
            fragment
                .map_position(2, CoordSpace::Original, CoordSpace::Fragment)
                .unwrap(),
            2
        );
        assert_eq!(
            fragment
                .map_position(4, CoordSpace::Fragment, CoordSpace::Original)
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_remove_code_drops_pair_and_reindexes() {
        let mut fragment = TextFragment::new();
        fragment.append_code(TagType::Opening, "b", "<b>").unwrap();
        fragment.append_text("bold");
        fragment.append_code(TagType::Closing, "b", "</b>").unwrap();
        fragment
            .append_code(TagType::Placeholder, "br", "<br/>")
            .unwrap();
        assert!(fragment.remove_code(1));
        assert_eq!(fragment.to_text(), "bold<br/>");
        assert_eq!(fragment.codes().len(), 1);
        assert!(fragment.validate().is_ok());
        assert!(!fragment.remove_code(1));
    }

    #[test]
    fn test_replace_code_keeps_id_and_role() {
        let mut fragment = TextFragment::new();
        fragment
            .append_code(TagType::Placeholder, "img", "<img src=\"a.png\"/>")
            .unwrap();
        fragment
            .replace_code(1, Code::new(TagType::Placeholder, "img", "<img src=\"b.png\"/>"))
            .unwrap();
        assert_eq!(fragment.to_text(), "<img src=\"b.png\"/>");
        let missing = fragment.replace_code(9, Code::new(TagType::Placeholder, "x", ""));
        assert!(matches!(missing, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_code_mut() {
        let mut fragment = TextFragment::new();
        fragment.append_code(TagType::Placeholder, "x", "%s").unwrap();
        fragment.code_mut(1).unwrap().deleteable = true;
        assert!(fragment.code_by_id(1).unwrap().deleteable);
    }

    #[test]
    fn test_append_fragment_renumbers_colliding_ids() {
        let mut left = TextFragment::new();
        left.append_text("a ");
        left.append_code(TagType::Placeholder, "x", "%s").unwrap();

        let mut right = TextFragment::new();
        right.append_code(TagType::Opening, "b", "<b>").unwrap();
        right.append_text("c");
        right.append_code(TagType::Closing, "b", "</b>").unwrap();

        left.append_fragment(&right).unwrap();
        assert_eq!(left.to_text(), "a %s<b>c</b>");
        assert!(left.validate().is_ok());
        let ids: Vec<i32> = left
            .view()
            .ordered_codes()
            .into_iter()
            .map(|(_, code)| code.id)
            .collect();
        // the appended pair collided with id 1 and moved together
        assert_eq!(ids, vec![1, 2, 2]);
    }

    #[test]
    fn test_append_fragment_without_collision_keeps_ids() {
        let mut left = TextFragment::from("a");
        let mut right = TextFragment::new();
        right
            .append_code_with_id(TagType::Placeholder, "x", "%s", 5)
            .unwrap();
        left.append_fragment(&right).unwrap();
        assert_eq!(left.code_by_id(5).unwrap().data, "%s");
    }

    #[test]
    fn test_split_off() {
        let mut fragment = two_placeholder_fragment();
        let right = fragment.split_off(5).unwrap();
        assert_eq!(fragment.to_text(), "abc<ph1/>");
        assert_eq!(right.to_text(), "def<ph2/>ghi");
        assert!(fragment.validate().is_ok());
        assert!(right.validate().is_ok());
        assert_eq!(fragment.codes().len(), 1);
        assert_eq!(right.codes().len(), 1);
    }

    #[test]
    fn test_split_off_inside_marker_fails() {
        let mut fragment = two_placeholder_fragment();
        let result = fragment.split_off(4);
        assert!(matches!(result, Err(Error::PositionOutOfRange { .. })));
    }

    #[test]
    fn test_clone_is_deep() {
        let original = two_placeholder_fragment();
        let mut cloned = original.clone();
        cloned.code_mut(1).unwrap().data = "<changed/>".to_string();
        assert_eq!(original.code_by_id(1).unwrap().data, "<ph1/>");
        assert_ne!(original, cloned);
    }

    #[test]
    fn test_insert_code() {
        let mut fragment = TextFragment::from("ac");
        fragment
            .insert_code(1, Code::new(TagType::Placeholder, "x", "<x/>"))
            .unwrap();
        assert_eq!(fragment.to_text(), "a<x/>c");
        assert!(fragment.validate().is_ok());
    }

    #[test]
    fn test_ordered_codes_positions() {
        let fragment = two_placeholder_fragment();
        let view = fragment.view();
        let positions: Vec<usize> = view.ordered_codes().iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![3, 8]);
    }

    #[test]
    fn test_ordered_codes_positions_in_other_spaces() {
        // abc<ph1/>def<ph2/>ghi / abc<1/>def<2/>ghi
        let fragment = two_placeholder_fragment();
        let view = fragment.view();
        let originals: Vec<usize> = view
            .ordered_codes_in(CoordSpace::Original)
            .iter()
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(originals, vec![3, 12]);
        let generics: Vec<usize> = view
            .ordered_codes_in(CoordSpace::Generic)
            .iter()
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(generics, vec![3, 10]);
    }

    #[test]
    fn test_serde_round_trip() {
        let fragment = two_placeholder_fragment();
        let json = serde_json::to_string(&fragment).unwrap();
        let back: TextFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fragment);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_from_coded_rejects_orphan_entry() {
        let result = TextFragment::from_coded(
            "plain".to_string(),
            vec![Code::new(TagType::Placeholder, "x", "%s").with_id(1)],
        );
        assert!(matches!(result, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_validate_detects_role_mismatch() {
        let mut text = String::from("a");
        text.push(MARKER_OPENING);
        text.push(index_to_char(0));
        let result = TextFragment::from_coded(
            text,
            vec![Code::new(TagType::Placeholder, "x", "%s").with_id(1)],
        );
        assert!(matches!(result, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_from_coded_rejects_duplicate_ids() {
        let mut text = String::from("a");
        text.push(MARKER_ISOLATED);
        text.push(index_to_char(0));
        text.push(MARKER_ISOLATED);
        text.push(index_to_char(1));
        let result = TextFragment::from_coded(
            text,
            vec![
                Code::new(TagType::Placeholder, "x", "%s").with_id(5),
                Code::new(TagType::Placeholder, "x", "%d").with_id(5),
            ],
        );
        assert!(matches!(result, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_from_coded_rejects_unassigned_id() {
        let mut text = String::new();
        text.push(MARKER_ISOLATED);
        text.push(index_to_char(0));
        let result =
            TextFragment::from_coded(text, vec![Code::new(TagType::Placeholder, "x", "%s")]);
        assert!(matches!(result, Err(Error::BadInput(_))));
    }

    #[test]
    fn test_from_coded_accepts_swapped_pair() {
        let mut text = String::from("x");
        text.push(MARKER_CLOSING);
        text.push(index_to_char(0));
        text.push(MARKER_OPENING);
        text.push(index_to_char(1));
        let fragment = TextFragment::from_coded(
            text,
            vec![
                Code::new(TagType::Closing, "b", "</b>").with_id(1),
                Code::new(TagType::Opening, "b", "<b>").with_id(1),
            ],
        )
        .unwrap();
        assert_eq!(fragment.to_text(), "x</b><b>");
        assert!(fragment.validate().is_ok());
    }

    #[test]
    fn test_index_char_round_trip() {
        for index in [0usize, 1, 42, MAX_INLINE_CODES - 1] {
            assert_eq!(char_to_index(index_to_char(index)), Some(index));
        }
        assert_eq!(char_to_index('a'), None);
    }

    #[test]
    fn test_generic_display() {
        let opening = Code::new(TagType::Opening, "b", "<b>").with_id(3);
        let closing = Code::new(TagType::Closing, "b", "</b>").with_id(3);
        let isolated = Code::new(TagType::Placeholder, "x", "%s").with_id(33);
        assert_eq!(opening.generic_display(), "<3>");
        assert_eq!(closing.generic_display(), "</3>");
        assert_eq!(isolated.generic_display(), "<33/>");
    }
}
