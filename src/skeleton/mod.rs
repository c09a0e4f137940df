//! Skeletons: the captured literal material around extracted text, stored
//! as structured parts so output reconstruction never re-parses marker
//! strings.
//!
//! A skeleton is an ordered list of [`SkeletonPart`]s. Literal text copies
//! to the output verbatim; a content reference stands for the owning text
//! unit's content in some locale; a value reference pulls in another
//! resource's content or one of its properties. [`writer::GenericSkeletonWriter`]
//! replays these parts, and [`embedded::EmbeddedSkeletonWriter`] does the
//! same for embedded sub-extractions with one buffer per output locale.

pub mod embedded;
pub mod writer;

use serde::{Deserialize, Serialize};

use crate::locale::LocaleId;

/// One piece of a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SkeletonPart {
    /// Literal text copied to the output verbatim.
    Text(String),
    /// The owning text unit's content. With `locale` unset the writer's
    /// bound output locale decides between source and target; with a locale
    /// set, that locale's target is rendered.
    ContentRef {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<LocaleId>,
    },
    /// Another resource's content or one of its properties, resolved
    /// against the referents seen so far.
    ValueRef {
        resource_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<LocaleId>,
    },
}

/// The captured literal material for one resource.
///
/// # Example
///
/// ```rust
/// use locfilter::Skeleton;
///
/// let mut skeleton = Skeleton::new();
/// skeleton.add_text("greeting=");
/// skeleton.add_content_ref(None);
/// skeleton.add_text("\n");
/// assert_eq!(skeleton.parts().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skeleton {
    parts: Vec<SkeletonPart>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a skeleton holding a single literal span.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut skeleton = Skeleton::new();
        skeleton.add_text(text);
        skeleton
    }

    pub fn parts(&self) -> &[SkeletonPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends literal text, merging into a trailing literal part when one
    /// is there.
    pub fn add_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        if let Some(SkeletonPart::Text(existing)) = self.parts.last_mut() {
            existing.push_str(&text);
        } else {
            self.parts.push(SkeletonPart::Text(text));
        }
    }

    /// Appends a reference to the owning resource's content.
    pub fn add_content_ref(&mut self, locale: Option<LocaleId>) {
        self.parts.push(SkeletonPart::ContentRef { locale });
    }

    /// Appends a reference to another resource's content.
    pub fn add_value_ref(&mut self, resource_id: impl Into<String>, locale: Option<LocaleId>) {
        self.parts.push(SkeletonPart::ValueRef {
            resource_id: resource_id.into(),
            property: None,
            locale,
        });
    }

    /// Appends a reference to another resource's property value.
    pub fn add_property_ref(
        &mut self,
        resource_id: impl Into<String>,
        property: impl Into<String>,
        locale: Option<LocaleId>,
    ) {
        self.parts.push(SkeletonPart::ValueRef {
            resource_id: resource_id.into(),
            property: Some(property.into()),
            locale,
        });
    }

    /// Moves all parts of `other` onto the end of this skeleton, merging
    /// adjacent literal spans.
    pub fn append(&mut self, other: Skeleton) {
        for part in other.parts {
            match part {
                SkeletonPart::Text(text) => self.add_text(text),
                other => self.parts.push(other),
            }
        }
    }
}

impl From<&str> for Skeleton {
    fn from(text: &str) -> Self {
        Skeleton::from_text(text)
    }
}
