//! Segmented text containers: ordered parts for a source locale plus
//! parallel part sequences per target locale.
//!
//! A [`TextPart`] wraps one [`TextFragment`] and is either a *segment*
//! (eligible for independent translation alignment) or *ignorable*
//! inter-segment material such as connecting whitespace. A [`TextContainer`]
//! keeps the source sequence and a map of target sequences that align 1:1
//! positionally with the source.
//!
//! Target sentence order can differ from source order (translated word
//! order); that is tracked through each part's explicit [`TextPart::target_order`]
//! attribute rather than by physically reordering parts, so merge logic can
//! always recover both the visual order and the logical source alignment.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::fragment::TextFragment;
use crate::locale::LocaleId;
use crate::resource::Annotations;

/// How [`TextContainer::create_target`] builds a fresh target sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBuilding {
    /// Mirror the source structure (ids, segment flags) with empty fragments.
    Empty,
    /// Deep-copy the source parts, content included.
    CloneSource,
}

/// One part of a container: a fragment plus segmentation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    /// Identifier within the container, if assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identifier the part had in the original document; preserved through
    /// merge so format writers can reproduce source-specific identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    /// The part's content.
    pub content: TextFragment,
    /// Whether this part is a segment (translation-alignment unit).
    pub segment: bool,
    /// Explicit 1-based visual position among the target parts; `0` means
    /// "same position as in the source".
    #[serde(default, skip_serializing_if = "is_zero")]
    pub target_order: i32,
    /// Free-form annotations attached by pipeline stages.
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}

impl TextPart {
    /// Creates a segment part.
    pub fn segment(content: impl Into<TextFragment>) -> Self {
        TextPart {
            id: None,
            original_id: None,
            content: content.into(),
            segment: true,
            target_order: 0,
            annotations: Annotations::new(),
        }
    }

    /// Creates an ignorable (non-segment) part.
    pub fn ignorable(content: impl Into<TextFragment>) -> Self {
        TextPart {
            segment: false,
            ..TextPart::segment(content)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_original_id(mut self, original_id: impl Into<String>) -> Self {
        self.original_id = Some(original_id.into());
        self
    }

    pub fn with_target_order(mut self, target_order: i32) -> Self {
        self.target_order = target_order;
        self
    }
}

/// An ordered sequence of parts for one locale, plus parallel part
/// sequences per target locale.
///
/// # Example
///
/// ```rust
/// use locfilter::{LocaleId, TargetBuilding, TextContainer, TextPart};
///
/// let mut container = TextContainer::new();
/// container.append_part(TextPart::segment("Hello."));
/// container.append_part(TextPart::ignorable(" "));
/// container.append_part(TextPart::segment("Bye."));
///
/// let fr = LocaleId::new("fr")?;
/// container.create_target(fr.clone(), false, TargetBuilding::Empty);
/// assert_eq!(container.target(&fr).map(|t| t.len()), Some(3));
/// assert!(container.target(&LocaleId::new("de")?).is_none());
/// # Ok::<(), locfilter::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContainer {
    parts: Vec<TextPart>,
    targets: BTreeMap<LocaleId, Vec<TextPart>>,
}

impl TextContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// The source parts in original order.
    pub fn parts(&self) -> &[TextPart] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&TextPart> {
        self.parts.get(index)
    }

    pub fn part_mut(&mut self, index: usize) -> Option<&mut TextPart> {
        self.parts.get_mut(index)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends a source part. Existing targets get a mirrored empty part so
    /// positional alignment is kept.
    pub fn append_part(&mut self, part: TextPart) {
        for target in self.targets.values_mut() {
            target.push(mirror_empty(&part));
        }
        self.parts.push(part);
    }

    /// Inserts a source part, mirroring an empty part into every target at
    /// the same position.
    pub fn insert_part(&mut self, index: usize, part: TextPart) -> Result<(), Error> {
        if index > self.parts.len() {
            return Err(Error::position_out_of_range(index, self.parts.len()));
        }
        for target in self.targets.values_mut() {
            if index <= target.len() {
                target.insert(index, mirror_empty(&part));
            }
        }
        self.parts.insert(index, part);
        Ok(())
    }

    /// Appends a segment built from a fragment.
    pub fn append_segment(&mut self, content: impl Into<TextFragment>) {
        self.append_part(TextPart::segment(content));
    }

    /// Appends an ignorable part built from a fragment.
    pub fn append_ignorable(&mut self, content: impl Into<TextFragment>) {
        self.append_part(TextPart::ignorable(content));
    }

    /// The segments among the source parts, with their part indices.
    pub fn segments(&self) -> impl Iterator<Item = (usize, &TextPart)> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| part.segment)
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// The target parts for a locale; `None` when that locale was never set.
    pub fn target(&self, locale: &LocaleId) -> Option<&[TextPart]> {
        self.targets.get(locale).map(|parts| parts.as_slice())
    }

    pub fn target_mut(&mut self, locale: &LocaleId) -> Option<&mut Vec<TextPart>> {
        self.targets.get_mut(locale)
    }

    pub fn has_target(&self, locale: &LocaleId) -> bool {
        self.targets.contains_key(locale)
    }

    /// The locales that have a target sequence, in sorted order.
    pub fn target_locales(&self) -> impl Iterator<Item = &LocaleId> {
        self.targets.keys()
    }

    pub fn remove_target(&mut self, locale: &LocaleId) -> bool {
        self.targets.remove(locale).is_some()
    }

    /// Gets or creates the target sequence for a locale.
    ///
    /// The first request creates it per `building`; later requests reuse the
    /// existing sequence unless `overwrite` is set.
    pub fn create_target(
        &mut self,
        locale: LocaleId,
        overwrite: bool,
        building: TargetBuilding,
    ) -> &mut Vec<TextPart> {
        let built: Vec<TextPart> = match building {
            TargetBuilding::Empty => self.parts.iter().map(mirror_empty).collect(),
            TargetBuilding::CloneSource => self.parts.clone(),
        };
        match self.targets.entry(locale) {
            Entry::Vacant(entry) => entry.insert(built),
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                if overwrite {
                    *slot = built;
                }
                slot
            }
        }
    }

    /// Whether a target exists for the locale and its part count matches the
    /// source's.
    pub fn target_aligned(&self, locale: &LocaleId) -> bool {
        self.target(locale)
            .is_some_and(|target| target.len() == self.parts.len())
    }

    /// Joins the part at `index` with the part at `index + 1`, across the
    /// source and every target.
    ///
    /// Fragments and code tables merge (colliding code ids renumber); the
    /// result keeps the first part's id, inherits the second's original id
    /// when the first has none, and is a segment when either side was.
    /// Explicit target-order indices greater than the join position shift
    /// down by one; an index that becomes equal to its own part's 1-based
    /// position resets to the default 0.
    ///
    /// When any merged code table would overflow the inline-code capacity
    /// the join fails and the container is left unchanged.
    pub fn join_adjacent(&mut self, index: usize) -> Result<(), Error> {
        if index + 1 >= self.parts.len() {
            return Err(Error::bad_input(format!(
                "cannot join part {} with part {}: container has {} parts",
                index,
                index + 1,
                self.parts.len()
            )));
        }
        // Stage every merge first; a failed join must leave all part
        // sequences in place and aligned.
        let joined_source = merge_pair(&self.parts[index], &self.parts[index + 1])?;
        let mut joined_targets: BTreeMap<LocaleId, TextPart> = BTreeMap::new();
        for (locale, target) in &self.targets {
            if index + 1 < target.len() {
                let joined = merge_pair(&target[index], &target[index + 1])?;
                joined_targets.insert(locale.clone(), joined);
            }
        }
        self.parts[index] = joined_source;
        self.parts.remove(index + 1);
        for (locale, target) in self.targets.iter_mut() {
            match joined_targets.remove(locale) {
                Some(joined) => {
                    target[index] = joined;
                    target.remove(index + 1);
                    renumber_after_join(target, index);
                }
                None => warn!(
                    locale = %locale,
                    index,
                    target_parts = target.len(),
                    "target not aligned with source; join skipped for this locale"
                ),
            }
        }
        Ok(())
    }

    /// Collapses all parts into one segment, across the source and every
    /// target. Target-order indices reset to the default.
    pub fn join_all(&mut self) -> Result<(), Error> {
        while self.parts.len() > 1 {
            self.join_adjacent(0)?;
        }
        if let Some(part) = self.parts.first_mut() {
            part.segment = true;
            part.target_order = 0;
        }
        for target in self.targets.values_mut() {
            if let Some(part) = target.first_mut() {
                part.segment = true;
                part.target_order = 0;
            }
        }
        Ok(())
    }

    /// Splits the source part at `index` at a fragment-space position,
    /// inserting the remainder as a new part at `index + 1`. Every target
    /// gets an empty companion part at the same position so alignment is
    /// preserved.
    ///
    /// Fails with [`Error::PositionOutOfRange`] when the position falls
    /// strictly inside a code marker.
    pub fn split_part(&mut self, index: usize, position: usize) -> Result<(), Error> {
        let len = self.parts.len();
        let part = self
            .parts
            .get_mut(index)
            .ok_or_else(|| Error::position_out_of_range(index, len))?;
        let right = part.content.split_off(position)?;
        let new_part = TextPart {
            id: None,
            original_id: None,
            content: right,
            segment: part.segment,
            target_order: 0,
            annotations: Annotations::new(),
        };
        let mirrored = mirror_empty(&new_part);
        for (locale, target) in self.targets.iter_mut() {
            if index < target.len() {
                target.insert(index + 1, mirrored.clone());
            } else {
                warn!(
                    locale = %locale,
                    index,
                    target_parts = target.len(),
                    "target not aligned with source; split skipped for this locale"
                );
            }
        }
        self.parts.insert(index + 1, new_part);
        Ok(())
    }
}

impl From<TextFragment> for TextContainer {
    fn from(fragment: TextFragment) -> Self {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment(fragment));
        container
    }
}

impl From<&str> for TextContainer {
    fn from(text: &str) -> Self {
        TextContainer::from(TextFragment::from(text))
    }
}

fn mirror_empty(part: &TextPart) -> TextPart {
    TextPart {
        id: part.id.clone(),
        original_id: None,
        content: TextFragment::new(),
        segment: part.segment,
        target_order: 0,
        annotations: Annotations::new(),
    }
}

fn merge_pair(first: &TextPart, second: &TextPart) -> Result<TextPart, Error> {
    let mut joined = first.clone();
    joined.content.append_fragment(&second.content)?;
    joined.segment = joined.segment || second.segment;
    if joined.original_id.is_none() {
        joined.original_id = second.original_id.clone();
    }
    for (key, value) in second.annotations.iter() {
        if !joined.annotations.contains(key) {
            joined.annotations.insert(key, value);
        }
    }
    Ok(joined)
}

/// One part was removed at `index + 1`; shift explicit orders past the join
/// position down, resetting any that land on their own 1-based position.
fn renumber_after_join(parts: &mut [TextPart], index: usize) {
    let joined_position = index as i32 + 1;
    for (j, part) in parts.iter_mut().enumerate() {
        if part.target_order == 0 || part.target_order <= joined_position {
            continue;
        }
        let shifted = part.target_order - 1;
        part.target_order = if shifted == j as i32 + 1 { 0 } else { shifted };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{MAX_INLINE_CODES, TagType};

    fn locale(tag: &str) -> LocaleId {
        LocaleId::new(tag).unwrap()
    }

    fn three_part_container() -> TextContainer {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("First.").with_id("0"));
        container.append_part(TextPart::ignorable(" "));
        container.append_part(TextPart::segment("Second.").with_id("1"));
        container
    }

    #[test]
    fn test_append_and_enumerate() {
        let container = three_part_container();
        assert_eq!(container.part_count(), 3);
        assert_eq!(container.segment_count(), 2);
        let indices: Vec<usize> = container.segments().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_target_absent_is_none() {
        let container = three_part_container();
        assert!(container.target(&locale("fr")).is_none());
        assert!(!container.has_target(&locale("fr")));
    }

    #[test]
    fn test_create_target_empty_mirrors_structure() {
        let mut container = three_part_container();
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        let target = container.target(&fr).unwrap();
        assert_eq!(target.len(), 3);
        assert!(target[0].segment);
        assert!(!target[1].segment);
        assert_eq!(target[0].id.as_deref(), Some("0"));
        assert!(target[0].content.is_empty());
        assert!(container.target_aligned(&fr));
    }

    #[test]
    fn test_create_target_clone_source() {
        let mut container = three_part_container();
        let de = locale("de");
        container.create_target(de.clone(), false, TargetBuilding::CloneSource);
        let target = container.target(&de).unwrap();
        assert_eq!(target[0].content.to_text(), "First.");
    }

    #[test]
    fn test_create_target_reuses_unless_overwrite() {
        let mut container = three_part_container();
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        container.target_mut(&fr).unwrap()[0].content = TextFragment::from("Premier.");
        // second request without overwrite keeps the filled translation
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        assert_eq!(
            container.target(&fr).unwrap()[0].content.to_text(),
            "Premier."
        );
        container.create_target(fr.clone(), true, TargetBuilding::Empty);
        assert!(container.target(&fr).unwrap()[0].content.is_empty());
    }

    #[test]
    fn test_append_part_keeps_existing_targets_aligned() {
        let mut container = three_part_container();
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        container.append_part(TextPart::segment("Third."));
        assert!(container.target_aligned(&fr));
        assert_eq!(container.target(&fr).unwrap().len(), 4);
    }

    #[test]
    fn test_join_adjacent_merges_source_and_target() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("a ").with_id("0"));
        container.append_part(TextPart::segment("c ").with_id("1"));
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        {
            let target = container.target_mut(&fr).unwrap();
            target[0].content = TextFragment::from("d ");
            target[1].content = TextFragment::from("A1 ");
        }
        container.join_adjacent(0).unwrap();
        assert_eq!(container.part_count(), 1);
        assert_eq!(container.parts()[0].content.to_text(), "a c ");
        assert_eq!(container.parts()[0].id.as_deref(), Some("0"));
        let target = container.target(&fr).unwrap();
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].content.to_text(), "d A1 ");
    }

    #[test]
    fn test_join_merges_code_tables() {
        let mut container = TextContainer::new();
        let mut first = TextFragment::new();
        first.append_text("x");
        first.append_code(TagType::Placeholder, "ph", "%s").unwrap();
        let mut second = TextFragment::new();
        second.append_code(TagType::Placeholder, "ph", "%d").unwrap();
        container.append_part(TextPart::segment(first));
        container.append_part(TextPart::segment(second));
        container.join_adjacent(0).unwrap();
        let joined = &container.parts()[0].content;
        assert_eq!(joined.to_text(), "x%s%d");
        assert!(joined.validate().is_ok());
        let ids: Vec<i32> = joined
            .view()
            .ordered_codes()
            .into_iter()
            .map(|(_, code)| code.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_join_preserves_original_id() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("a"));
        container.append_part(TextPart::segment("b").with_original_id("seg-7"));
        container.join_adjacent(0).unwrap();
        assert_eq!(container.parts()[0].original_id.as_deref(), Some("seg-7"));
    }

    #[test]
    fn test_join_out_of_bounds() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("only"));
        assert!(matches!(
            container.join_adjacent(0),
            Err(Error::BadInput(_))
        ));
    }

    // Characterization of the order renumbering: explicit orders past the
    // join position shift down by one.
    #[test]
    fn test_join_shifts_explicit_target_order_down() {
        let mut container = TextContainer::new();
        for text in ["s1 ", "s2 ", "s3 ", "s4 ", "s5 "] {
            container.append_part(TextPart::segment(text));
        }
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::CloneSource);
        // the last part renders fourth
        container.target_mut(&fr).unwrap()[4].target_order = 4;
        container.join_adjacent(0).unwrap();
        let target = container.target(&fr).unwrap();
        assert_eq!(target.len(), 4);
        assert_eq!(target[3].target_order, 3);
    }

    // Characterization of the order renumbering: an order landing on its own
    // 1-based position resets to the default 0.
    #[test]
    fn test_join_resets_order_matching_own_position() {
        let mut container = TextContainer::new();
        for text in ["s1 ", "s2 ", "s3 ", "s4 "] {
            container.append_part(TextPart::segment(text));
        }
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::CloneSource);
        container.target_mut(&fr).unwrap()[3].target_order = 4;
        container.join_adjacent(0).unwrap();
        let target = container.target(&fr).unwrap();
        // old position 4 became position 3 and order 4 became 3 == own
        // position, so it collapses to the default
        assert_eq!(target[2].target_order, 0);
    }

    #[test]
    fn test_join_skips_short_target_with_warning() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("a"));
        container.append_part(TextPart::segment("b"));
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        container.target_mut(&fr).unwrap().pop();
        container.join_adjacent(0).unwrap();
        assert_eq!(container.part_count(), 1);
        // the misaligned target is left as-is
        assert_eq!(container.target(&fr).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_join_leaves_container_unchanged() {
        let half = MAX_INLINE_CODES / 2 + 1;
        let mut first = TextFragment::new();
        let mut second = TextFragment::new();
        for _ in 0..half {
            first.append_code(TagType::Placeholder, "ph", "%s").unwrap();
            second.append_code(TagType::Placeholder, "ph", "%s").unwrap();
        }
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment(first));
        container.append_part(TextPart::segment(second));
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);

        // the two code tables cannot merge into one fragment
        assert!(matches!(container.join_adjacent(0), Err(Error::BadInput(_))));
        assert_eq!(container.part_count(), 2);
        assert_eq!(container.parts()[0].content.codes().len(), half);
        assert_eq!(container.parts()[1].content.codes().len(), half);
        assert!(container.target_aligned(&fr));
    }

    #[test]
    fn test_join_all() {
        let mut container = three_part_container();
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::CloneSource);
        container.join_all().unwrap();
        assert_eq!(container.part_count(), 1);
        assert!(container.parts()[0].segment);
        assert_eq!(container.parts()[0].content.to_text(), "First. Second.");
        assert_eq!(
            container.target(&fr).unwrap()[0].content.to_text(),
            "First. Second."
        );
    }

    #[test]
    fn test_split_part_keeps_alignment() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("one two"));
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::CloneSource);
        container.split_part(0, 3).unwrap();
        assert_eq!(container.part_count(), 2);
        assert_eq!(container.parts()[0].content.to_text(), "one");
        assert_eq!(container.parts()[1].content.to_text(), " two");
        assert!(container.parts()[1].segment);
        let target = container.target(&fr).unwrap();
        assert_eq!(target.len(), 2);
        assert!(target[1].content.is_empty());
    }

    #[test]
    fn test_split_part_skips_short_target_with_warning() {
        let mut container = TextContainer::new();
        container.append_part(TextPart::segment("one"));
        container.append_part(TextPart::segment("two four"));
        let fr = locale("fr");
        container.create_target(fr.clone(), false, TargetBuilding::Empty);
        container.target_mut(&fr).unwrap().pop();
        container.split_part(1, 3).unwrap();
        assert_eq!(container.part_count(), 3);
        assert_eq!(container.parts()[2].content.to_text(), " four");
        // the misaligned target is left as-is
        assert_eq!(container.target(&fr).unwrap().len(), 1);
    }

    #[test]
    fn test_split_inside_marker_fails() {
        let mut fragment = TextFragment::new();
        fragment.append_text("a");
        fragment.append_code(TagType::Placeholder, "ph", "%s").unwrap();
        let mut container = TextContainer::from(fragment);
        let result = container.split_part(0, 2);
        assert!(matches!(result, Err(Error::PositionOutOfRange { .. })));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut container = three_part_container();
        container.create_target(locale("fr"), false, TargetBuilding::CloneSource);
        let json = serde_json::to_string(&container).unwrap();
        let back: TextContainer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, container);
    }
}
