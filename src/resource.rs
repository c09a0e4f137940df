//! Resources carried by filter events: document/group boundaries, text
//! units, verbatim document parts, and the property/annotation maps that
//! ride along with them.
//!
//! Capability traits ([`HasProperties`], [`HasAnnotations`], [`HasSkeleton`])
//! mark what each resource kind supports instead of forcing one wide
//! interface on all of them; [`CustomResource`] deliberately has no skeleton
//! capability since custom payloads never take part in output
//! reconstruction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::container::TextContainer;
use crate::fragment::TextFragment;
use crate::locale::LocaleId;
use crate::params::Parameters;
use crate::skeleton::Skeleton;

/// Read-only property holding the document language. Rewritten by skeleton
/// writers when output goes to a different locale.
pub const PROP_LANGUAGE: &str = "language";
/// Read-only property holding the document encoding. Rewritten by skeleton
/// writers when output uses a different encoding.
pub const PROP_ENCODING: &str = "encoding";

/// Named string properties attached to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Free-form annotations attached by pipeline stages. Keys are namespaced
/// strings, for example `locfilter.checker.skip`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Annotations {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Annotations(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Resource kinds that carry named properties.
pub trait HasProperties {
    fn properties(&self) -> &Properties;
    fn properties_mut(&mut self) -> &mut Properties;
}

/// Resource kinds that carry annotations.
pub trait HasAnnotations {
    fn annotations(&self) -> &Annotations;
    fn annotations_mut(&mut self) -> &mut Annotations;
}

/// Resource kinds that can carry a skeleton chunk for output
/// reconstruction.
pub trait HasSkeleton {
    fn skeleton(&self) -> Option<&Skeleton>;
    fn set_skeleton(&mut self, skeleton: Skeleton);
    fn take_skeleton(&mut self) -> Option<Skeleton>;
}

macro_rules! impl_capabilities {
    ($type:ty) => {
        impl HasProperties for $type {
            fn properties(&self) -> &Properties {
                &self.properties
            }
            fn properties_mut(&mut self) -> &mut Properties {
                &mut self.properties
            }
        }

        impl HasAnnotations for $type {
            fn annotations(&self) -> &Annotations {
                &self.annotations
            }
            fn annotations_mut(&mut self) -> &mut Annotations {
                &mut self.annotations
            }
        }

        impl HasSkeleton for $type {
            fn skeleton(&self) -> Option<&Skeleton> {
                self.skeleton.as_ref()
            }
            fn set_skeleton(&mut self, skeleton: Skeleton) {
                self.skeleton = Some(skeleton);
            }
            fn take_skeleton(&mut self) -> Option<Skeleton> {
                self.skeleton.take()
            }
        }
    };
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_true(value: &bool) -> bool {
    *value
}

fn default_true() -> bool {
    true
}

/// Opens an extracted document: source locale, encoding, and the settings
/// writers need to reproduce the original file faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub locale: LocaleId,
    pub encoding: String,
    /// Line break sequence of the original document.
    pub line_break: String,
    /// Whether the document itself stores more than one language.
    #[serde(default, skip_serializing_if = "is_false")]
    pub multilingual: bool,
    /// Identifier of the filter that produced the events.
    pub filter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    /// Locales the caller wants output for, beyond the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_locales: Vec<LocaleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl StartDocument {
    pub fn new(id: impl Into<String>, locale: LocaleId) -> Self {
        StartDocument {
            id: id.into(),
            name: None,
            locale,
            encoding: "UTF-8".to_string(),
            line_break: "\n".to_string(),
            multilingual: false,
            filter_id: String::new(),
            parameters: None,
            target_locales: Vec::new(),
            skeleton: None,
            properties: Properties::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_line_break(mut self, line_break: impl Into<String>) -> Self {
        self.line_break = line_break.into();
        self
    }

    pub fn with_multilingual(mut self, multilingual: bool) -> Self {
        self.multilingual = multilingual;
        self
    }

    pub fn with_filter_id(mut self, filter_id: impl Into<String>) -> Self {
        self.filter_id = filter_id.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_target_locales(mut self, target_locales: Vec<LocaleId>) -> Self {
        self.target_locales = target_locales;
        self
    }
}

impl_capabilities!(StartDocument);

/// Closes a document, sub-document, or group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ending {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl Ending {
    pub fn new(id: impl Into<String>) -> Self {
        Ending {
            id: id.into(),
            ..Ending::default()
        }
    }
}

impl_capabilities!(Ending);

/// Opens a sub-document, typically an embedded file within a container
/// format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSubDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Filter handling the embedded content, when it differs from the
    /// enclosing document's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl StartSubDocument {
    pub fn new(id: impl Into<String>) -> Self {
        StartSubDocument {
            id: id.into(),
            ..StartSubDocument::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl_capabilities!(StartSubDocument);

/// Opens a logical grouping of extracted content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// Referent groups are held back by skeleton writers and emitted where
    /// another resource's skeleton references them.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_referent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl StartGroup {
    pub fn new(id: impl Into<String>) -> Self {
        StartGroup {
            id: id.into(),
            ..StartGroup::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_group_type(mut self, group_type: impl Into<String>) -> Self {
        self.group_type = Some(group_type.into());
        self
    }

    pub fn with_referent(mut self, is_referent: bool) -> Self {
        self.is_referent = is_referent;
        self
    }
}

impl_capabilities!(StartGroup);

/// Extracted translatable content with its source container and any
/// target sequences filled in so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub translatable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub preserve_whitespace: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_referent: bool,
    pub content: TextContainer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl TextUnit {
    pub fn new(id: impl Into<String>) -> Self {
        TextUnit {
            id: id.into(),
            name: None,
            unit_type: None,
            translatable: true,
            preserve_whitespace: false,
            is_referent: false,
            content: TextContainer::new(),
            skeleton: None,
            properties: Properties::new(),
            annotations: Annotations::new(),
        }
    }

    /// Creates a unit whose source is a single segment holding `fragment`.
    pub fn from_fragment(id: impl Into<String>, fragment: TextFragment) -> Self {
        let mut unit = TextUnit::new(id);
        unit.content = TextContainer::from(fragment);
        unit
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = Some(unit_type.into());
        self
    }

    pub fn with_translatable(mut self, translatable: bool) -> Self {
        self.translatable = translatable;
        self
    }

    pub fn with_preserve_whitespace(mut self, preserve_whitespace: bool) -> Self {
        self.preserve_whitespace = preserve_whitespace;
        self
    }

    pub fn with_referent(mut self, is_referent: bool) -> Self {
        self.is_referent = is_referent;
        self
    }

    /// Plain text of the whole source, codes rendered as their original
    /// data.
    pub fn source_text(&self) -> String {
        self.content
            .parts()
            .iter()
            .map(|part| part.content.to_text())
            .collect()
    }
}

impl_capabilities!(TextUnit);

/// Non-extractable span kept only for output reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPart {
    pub id: String,
    /// Referent parts are held back by skeleton writers and emitted where
    /// another resource's skeleton references them.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_referent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Skeleton>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl DocumentPart {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentPart {
            id: id.into(),
            ..DocumentPart::default()
        }
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    pub fn with_referent(mut self, is_referent: bool) -> Self {
        self.is_referent = is_referent;
        self
    }
}

impl_capabilities!(DocumentPart);

/// Application-defined payload passed through the pipeline untouched.
/// Carries annotations but no skeleton: custom payloads never take part in
/// output reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl CustomResource {
    pub fn new(id: impl Into<String>) -> Self {
        CustomResource {
            id: id.into(),
            ..CustomResource::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl HasAnnotations for CustomResource {
    fn annotations(&self) -> &Annotations {
        &self.annotations
    }
    fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }
}
