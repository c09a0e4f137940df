//! Source/target inline-code consistency checking.
//!
//! Compares the inline codes of a source fragment against those of a
//! candidate translation and records every difference as a [`Finding`]:
//! codes the target lost, codes it invented, and optionally codes whose
//! order changed. Findings are plain data for the caller to drain; the
//! checker never mutates what it checks and never fails on data shape.

use serde::{Deserialize, Serialize};

use crate::fragment::{Code, CoordSpace, TagType, TextFragment};
use crate::locale::LocaleId;
use crate::resource::{HasAnnotations, TextUnit};

/// Annotation key that exempts a whole text unit (set on the unit) or a
/// single segment (set on the part) from checking.
pub const SKIP_ANNOTATION: &str = "locfilter.checker.skip";

/// Options controlling an [`InlineCodeChecker`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerOptions {
    /// Requires the codes shared by both sides to appear in the same
    /// textual order.
    #[serde(default)]
    pub strict_order: bool,
    /// Reports codes by their generic label (`<1>`, `</1>`, `<1/>`) and
    /// positions in generic coordinates, instead of raw data and original
    /// coordinates.
    #[serde(default)]
    pub use_generic_ids: bool,
    /// Type labels whose codes are excluded from checking entirely.
    /// Codes with an empty type label are never excluded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types_to_ignore: Vec<String>,
    /// Rendered forms of codes the target may drop without a finding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_codes_allowed: Vec<String>,
    /// Rendered forms of codes the target may add without a finding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_codes_allowed: Vec<String>,
}

impl CheckerOptions {
    /// Creates the default options: lenient order, raw-data reporting,
    /// empty allowed lists.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_order(mut self, strict_order: bool) -> Self {
        self.strict_order = strict_order;
        self
    }

    pub fn with_generic_ids(mut self, use_generic_ids: bool) -> Self {
        self.use_generic_ids = use_generic_ids;
        self
    }

    pub fn with_types_to_ignore(mut self, types_to_ignore: Vec<String>) -> Self {
        self.types_to_ignore = types_to_ignore;
        self
    }

    pub fn with_missing_codes_allowed(mut self, missing_codes_allowed: Vec<String>) -> Self {
        self.missing_codes_allowed = missing_codes_allowed;
        self
    }

    pub fn with_extra_codes_allowed(mut self, extra_codes_allowed: Vec<String>) -> Self {
        self.extra_codes_allowed = extra_codes_allowed;
        self
    }
}

/// What a [`Finding`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    /// A source code has no counterpart in the target.
    MissingCode,
    /// A target code has no counterpart in the source.
    ExtraCode,
    /// Codes present on both sides appear in a different order.
    OrderMismatch,
}

/// One reported code: id, role, and start position in the reporting
/// coordinate space (original by default, generic under
/// [`CheckerOptions::use_generic_ids`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    pub id: i32,
    pub tag_type: TagType,
    pub position: usize,
}

/// One consistency problem found in a source/target pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Id of the text unit the pair came from; empty for bare fragment
    /// pairs.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_id: String,
    /// Index of the source segment's part within its container.
    #[serde(default)]
    pub segment_index: usize,
    /// Id of the source segment part, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    /// Source codes involved: the missing ones, or the source side of an
    /// order mismatch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_codes: Vec<CodeRef>,
    /// Target codes involved: the extra ones, or the target side of an
    /// order mismatch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_codes: Vec<CodeRef>,
    pub message: String,
}

/// Where a checked pair came from, for finding attribution.
#[derive(Clone, Default)]
struct PairContext {
    unit_id: String,
    segment_index: usize,
    part_id: Option<String>,
}

/// A code plus its start position in the reporting space.
#[derive(Clone, Copy)]
struct Placed<'a> {
    position: usize,
    code: &'a Code,
}

fn roles_swapped(a: TagType, b: TagType) -> bool {
    matches!(
        (a, b),
        (TagType::Opening, TagType::Closing) | (TagType::Closing, TagType::Opening)
    )
}

fn code_refs(placed: &[Placed<'_>]) -> Vec<CodeRef> {
    placed
        .iter()
        .map(|entry| CodeRef {
            id: entry.code.id,
            tag_type: entry.code.tag_type,
            position: entry.position,
        })
        .collect()
}

/// Compares the inline codes of source/target pairs and accumulates
/// [`Finding`]s.
///
/// # Example
///
/// ```rust
/// use locfilter::checker::{CheckerOptions, FindingKind, InlineCodeChecker};
/// use locfilter::{LocaleId, TagType, TextFragment};
///
/// let mut source = TextFragment::from("Press ");
/// source.append_code(TagType::Placeholder, "kbd", "<kbd/>")?;
///
/// let mut checker = InlineCodeChecker::new(
///     LocaleId::new("en")?,
///     LocaleId::new("fr")?,
///     CheckerOptions::new(),
/// );
/// checker.check_fragments(&source, &TextFragment::from("Appuyez"));
///
/// let findings = checker.take_findings();
/// assert_eq!(findings.len(), 1);
/// assert_eq!(findings[0].kind, FindingKind::MissingCode);
/// # Ok::<(), locfilter::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct InlineCodeChecker {
    source_locale: LocaleId,
    target_locale: LocaleId,
    options: CheckerOptions,
    findings: Vec<Finding>,
}

impl InlineCodeChecker {
    pub fn new(source_locale: LocaleId, target_locale: LocaleId, options: CheckerOptions) -> Self {
        InlineCodeChecker {
            source_locale,
            target_locale,
            options,
            findings: Vec::new(),
        }
    }

    /// Reconfigures the checker for a new run and clears the accumulated
    /// findings.
    pub fn start_process(
        &mut self,
        source_locale: LocaleId,
        target_locale: LocaleId,
        options: CheckerOptions,
    ) {
        self.source_locale = source_locale;
        self.target_locale = target_locale;
        self.options = options;
        self.findings.clear();
    }

    pub fn source_locale(&self) -> &LocaleId {
        &self.source_locale
    }

    pub fn target_locale(&self) -> &LocaleId {
        &self.target_locale
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    /// The findings accumulated so far, in processing order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Drains the accumulated findings.
    pub fn take_findings(&mut self) -> Vec<Finding> {
        std::mem::take(&mut self.findings)
    }

    /// Checks every aligned source/target segment pair of one unit.
    ///
    /// Non-translatable units, units without a target for the checker's
    /// target locale, and units or parts carrying [`SKIP_ANNOTATION`]
    /// produce no findings. Target parts pair with source parts by
    /// position; a segment whose position has no target part is skipped.
    pub fn process_text_unit(&mut self, unit: &TextUnit) {
        if !unit.translatable || unit.annotations().contains(SKIP_ANNOTATION) {
            return;
        }
        let Some(target_parts) = unit.content.target(&self.target_locale) else {
            return;
        };
        for (index, part) in unit.content.segments() {
            if part.annotations.contains(SKIP_ANNOTATION) {
                continue;
            }
            let Some(target) = target_parts.get(index) else {
                continue;
            };
            let context = PairContext {
                unit_id: unit.id.clone(),
                segment_index: index,
                part_id: part.id.clone(),
            };
            self.check_pair(&context, &part.content, &target.content);
        }
    }

    /// Checks one bare source/target fragment pair, outside any unit.
    pub fn check_fragments(&mut self, source: &TextFragment, target: &TextFragment) {
        self.check_pair(&PairContext::default(), source, target);
    }

    fn check_pair(&mut self, context: &PairContext, source: &TextFragment, target: &TextFragment) {
        let src_all = self.relevant_codes(source);
        let trg_all = self.relevant_codes(target);
        if src_all.is_empty() && trg_all.is_empty() {
            return;
        }

        // Pair up counterparts: same id and type label, with equal data or
        // opening/closing roles swapped in the translation. Only the first
        // candidate per source code is considered; whatever stays unpaired
        // is a missing/extra candidate.
        let mut src_left = src_all.clone();
        let mut trg_left = trg_all.clone();
        let mut i = 0;
        while i < src_left.len() {
            let sc = src_left[i].code;
            let candidate = trg_left
                .iter()
                .position(|entry| entry.code.id == sc.id && entry.code.code_type == sc.code_type);
            let mut paired = false;
            if let Some(j) = candidate {
                let tc = trg_left[j].code;
                paired = sc.data == tc.data || roles_swapped(sc.tag_type, tc.tag_type);
                if paired {
                    trg_left.remove(j);
                    src_left.remove(i);
                }
            }
            if !paired {
                i += 1;
            }
        }

        // An order verdict on a pair that already lost or gained codes
        // would be noise; report the stronger problem only.
        let mut order_checkable = true;

        src_left.retain(|entry| {
            !entry.code.deleteable
                && !self
                    .options
                    .missing_codes_allowed
                    .contains(&self.listed_form(entry.code))
        });
        if !src_left.is_empty() {
            let message = format!(
                "Missing placeholders in the target: {}",
                self.code_list(&src_left)
            );
            self.push_finding(context, FindingKind::MissingCode, &src_left, &[], message);
            order_checkable = false;
        }

        trg_left.retain(|entry| {
            !entry.code.deleteable
                && !self
                    .options
                    .extra_codes_allowed
                    .contains(&self.listed_form(entry.code))
        });
        if !trg_left.is_empty() {
            let message = format!(
                "Extra placeholders in the target: {}",
                self.code_list(&trg_left)
            );
            self.push_finding(context, FindingKind::ExtraCode, &[], &trg_left, message);
            order_checkable = false;
        }

        if order_checkable && self.options.strict_order {
            self.check_order(context, &src_all, &trg_all);
        }
    }

    /// Greedy in-order walk over the full code sequences. A deleteable
    /// source code the target does not show at the cursor is skipped; the
    /// first genuine disagreement ends the walk with one finding.
    fn check_order(&mut self, context: &PairContext, src: &[Placed<'_>], trg: &[Placed<'_>]) {
        let mut j = 0;
        for entry in src {
            let sc = entry.code;
            match trg.get(j) {
                None => {
                    if sc.deleteable {
                        continue;
                    }
                    self.push_finding(
                        context,
                        FindingKind::OrderMismatch,
                        std::slice::from_ref(entry),
                        &[],
                        "Suspect sequence of target inline codes.".to_string(),
                    );
                    break;
                }
                Some(trg_entry) => {
                    let tc = trg_entry.code;
                    if sc.tag_type != tc.tag_type || sc.id != tc.id {
                        if sc.deleteable {
                            continue;
                        }
                        let message = format!(
                            "Suspect sequence of codes in the target: \
                             source code ID={} ({}), target code ID={} ({}).",
                            sc.id, sc.tag_type, tc.id, tc.tag_type
                        );
                        self.push_finding(
                            context,
                            FindingKind::OrderMismatch,
                            std::slice::from_ref(entry),
                            std::slice::from_ref(trg_entry),
                            message,
                        );
                        break;
                    }
                    j += 1;
                }
            }
        }
    }

    fn push_finding(
        &mut self,
        context: &PairContext,
        kind: FindingKind,
        source: &[Placed<'_>],
        target: &[Placed<'_>],
        message: String,
    ) {
        self.findings.push(Finding {
            kind,
            unit_id: context.unit_id.clone(),
            segment_index: context.segment_index,
            part_id: context.part_id.clone(),
            source_codes: code_refs(source),
            target_codes: code_refs(target),
            message,
        });
    }

    /// The codes of a fragment in textual order, with positions in the
    /// reporting space, minus the ignored type labels.
    fn relevant_codes<'a>(&self, fragment: &'a TextFragment) -> Vec<Placed<'a>> {
        fragment
            .view()
            .ordered_codes_in(self.reporting_space())
            .into_iter()
            .filter(|(_, code)| {
                code.code_type.is_empty() || !self.options.types_to_ignore.contains(&code.code_type)
            })
            .map(|(position, code)| Placed { position, code })
            .collect()
    }

    fn reporting_space(&self) -> CoordSpace {
        if self.options.use_generic_ids {
            CoordSpace::Generic
        } else {
            CoordSpace::Original
        }
    }

    /// The form a code takes in the allowed lists: its generic label under
    /// `use_generic_ids`, its raw data otherwise.
    fn listed_form(&self, code: &Code) -> String {
        if self.options.use_generic_ids {
            code.generic_display()
        } else {
            code.data.clone()
        }
    }

    /// Comma-separated rendering for messages: generic labels under
    /// `use_generic_ids`, quoted raw data otherwise (generic label again
    /// when the data is empty and there is nothing to quote).
    fn code_list(&self, placed: &[Placed<'_>]) -> String {
        placed
            .iter()
            .map(|entry| {
                let code = entry.code;
                if self.options.use_generic_ids || code.data.is_empty() {
                    code.generic_display()
                } else {
                    format!("\"{}\"", code.data)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
