//! Skeleton replay: turning a resource stream back into output text.
//!
//! [`GenericSkeletonWriter`] is the reference implementation of
//! [`SkeletonWriter`]: it copies literal skeleton spans verbatim, fills
//! content references from the source or the bound output locale's target,
//! holds referent resources back until something references them, and
//! rewrites the document language/encoding properties for the requested
//! output.

use std::collections::HashMap;

use tracing::warn;

use crate::container::TextContainer;
use crate::encoder::{Encoder, PlainEncoder};
use crate::error::Error;
use crate::fragment::TextFragment;
use crate::locale::LocaleId;
use crate::resource::{
    DocumentPart, Ending, PROP_ENCODING, PROP_LANGUAGE, Properties, StartDocument, StartGroup,
    StartSubDocument, TextUnit,
};
use crate::skeleton::{Skeleton, SkeletonPart};

/// Longest chain of value references followed before the writer gives up
/// and reports a merge error. Keeps malformed self-referential skeletons
/// from recursing forever.
const MAX_REF_DEPTH: usize = 8;

/// Produces the output string for each resource of a document, called in
/// exactly the order the resources were read.
///
/// Implementations are pure functions of the resource and the writer's
/// accumulated state. `process_start_document` binds the output locale
/// (`None` renders the source) and encoding for the rest of the document.
pub trait SkeletonWriter {
    fn process_start_document(
        &mut self,
        output_locale: Option<LocaleId>,
        output_encoding: &str,
        resource: &StartDocument,
    ) -> Result<String, Error>;

    fn process_end_document(&mut self, resource: &Ending) -> Result<String, Error>;

    fn process_start_sub_document(&mut self, resource: &StartSubDocument)
    -> Result<String, Error>;

    fn process_end_sub_document(&mut self, resource: &Ending) -> Result<String, Error>;

    fn process_start_group(&mut self, resource: &StartGroup) -> Result<String, Error>;

    fn process_end_group(&mut self, resource: &Ending) -> Result<String, Error>;

    fn process_text_unit(&mut self, resource: &TextUnit) -> Result<String, Error>;

    fn process_document_part(&mut self, resource: &DocumentPart) -> Result<String, Error>;

    /// Releases per-document state. The writer can be reused for another
    /// document afterwards.
    fn close(&mut self);
}

/// A resource held back because it was flagged as a referent.
#[derive(Debug, Clone)]
enum Referent {
    Unit(TextUnit),
    Part(DocumentPart),
    Group {
        rendered: String,
        properties: Properties,
    },
}

/// An in-progress capture of a referent group's output.
#[derive(Debug)]
struct Capture {
    id: String,
    properties: Properties,
    depth: usize,
    buffer: String,
}

/// What the skeleton being rendered belongs to, for resolving content and
/// self references.
#[derive(Clone, Copy)]
struct RenderContext<'a> {
    id: &'a str,
    properties: &'a Properties,
    container: Option<&'a TextContainer>,
}

/// The stock [`SkeletonWriter`].
#[derive(Debug)]
pub struct GenericSkeletonWriter {
    output_locale: Option<LocaleId>,
    output_encoding: String,
    multilingual: bool,
    encoder: Box<dyn Encoder>,
    referents: HashMap<String, Referent>,
    captures: Vec<Capture>,
    group_depth: usize,
}

impl Default for GenericSkeletonWriter {
    fn default() -> Self {
        GenericSkeletonWriter {
            output_locale: None,
            output_encoding: String::new(),
            multilingual: false,
            encoder: Box::new(PlainEncoder),
            referents: HashMap::new(),
            captures: Vec::new(),
            group_depth: 0,
        }
    }
}

impl GenericSkeletonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a format-specific [`Encoder`]; the default passes text
    /// through unescaped.
    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// The locale bound at `process_start_document`; `None` means source
    /// output.
    pub fn output_locale(&self) -> Option<&LocaleId> {
        self.output_locale.as_ref()
    }

    pub fn output_encoding(&self) -> &str {
        &self.output_encoding
    }

    /// Routes rendered output either to the innermost referent-group
    /// capture or to the caller.
    fn deliver(&mut self, rendered: String) -> Result<String, Error> {
        if let Some(capture) = self.captures.last_mut() {
            capture.buffer.push_str(&rendered);
            Ok(String::new())
        } else {
            Ok(rendered)
        }
    }

    fn render_optional_skeleton(
        &self,
        skeleton: Option<&Skeleton>,
        ctx: RenderContext<'_>,
    ) -> Result<String, Error> {
        match skeleton {
            Some(skeleton) => self.render_skeleton(skeleton, ctx, 0),
            None => Ok(String::new()),
        }
    }

    fn render_skeleton(
        &self,
        skeleton: &Skeleton,
        ctx: RenderContext<'_>,
        depth: usize,
    ) -> Result<String, Error> {
        if depth > MAX_REF_DEPTH {
            return Err(Error::merge(format!(
                "reference chain too deep while rendering resource `{}`",
                ctx.id
            )));
        }
        let mut out = String::new();
        for part in skeleton.parts() {
            match part {
                SkeletonPart::Text(text) => out.push_str(text),
                SkeletonPart::ContentRef { locale } => {
                    let container = ctx.container.ok_or_else(|| {
                        Error::merge(format!(
                            "content reference outside a text unit (resource `{}`)",
                            ctx.id
                        ))
                    })?;
                    let locale = locale.as_ref().or(self.output_locale.as_ref());
                    out.push_str(&self.render_container(container, locale, ctx.id)?);
                }
                SkeletonPart::ValueRef {
                    resource_id,
                    property,
                    locale,
                } => {
                    let locale = locale.as_ref().or(self.output_locale.as_ref());
                    let rendered = if resource_id == ctx.id {
                        self.render_self_ref(ctx, property.as_deref(), locale)?
                    } else {
                        self.render_referent(resource_id, property.as_deref(), locale, depth)?
                    };
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    fn render_self_ref(
        &self,
        ctx: RenderContext<'_>,
        property: Option<&str>,
        locale: Option<&LocaleId>,
    ) -> Result<String, Error> {
        match property {
            Some(name) => self.render_property(ctx.id, ctx.properties, name, locale),
            None => {
                let container = ctx.container.ok_or_else(|| {
                    Error::merge(format!(
                        "content reference outside a text unit (resource `{}`)",
                        ctx.id
                    ))
                })?;
                self.render_container(container, locale, ctx.id)
            }
        }
    }

    fn render_referent(
        &self,
        resource_id: &str,
        property: Option<&str>,
        locale: Option<&LocaleId>,
        depth: usize,
    ) -> Result<String, Error> {
        let referent = self.referents.get(resource_id).ok_or_else(|| {
            Error::merge(format!("unresolved reference to resource `{resource_id}`"))
        })?;
        match (referent, property) {
            (Referent::Unit(unit), Some(name)) => {
                self.render_property(&unit.id, &unit.properties, name, locale)
            }
            (Referent::Unit(unit), None) => match &unit.skeleton {
                Some(skeleton) => self.render_skeleton(
                    skeleton,
                    RenderContext {
                        id: &unit.id,
                        properties: &unit.properties,
                        container: Some(&unit.content),
                    },
                    depth + 1,
                ),
                None => self.render_container(&unit.content, locale, &unit.id),
            },
            (Referent::Part(part), Some(name)) => {
                self.render_property(&part.id, &part.properties, name, locale)
            }
            (Referent::Part(part), None) => self.render_optional_nested(part, depth),
            (Referent::Group { properties, .. }, Some(name)) => {
                self.render_property(resource_id, properties, name, locale)
            }
            (Referent::Group { rendered, .. }, None) => Ok(rendered.clone()),
        }
    }

    fn render_optional_nested(&self, part: &DocumentPart, depth: usize) -> Result<String, Error> {
        match &part.skeleton {
            Some(skeleton) => self.render_skeleton(
                skeleton,
                RenderContext {
                    id: &part.id,
                    properties: &part.properties,
                    container: None,
                },
                depth + 1,
            ),
            None => Ok(String::new()),
        }
    }

    /// Property lookup with the output rewrite: the document language and
    /// encoding render as the bound output values, not the captured ones.
    fn render_property(
        &self,
        resource_id: &str,
        properties: &Properties,
        name: &str,
        locale: Option<&LocaleId>,
    ) -> Result<String, Error> {
        if name == PROP_LANGUAGE
            && !self.multilingual
            && let Some(locale) = locale
        {
            return Ok(locale.as_str().to_string());
        }
        if name == PROP_ENCODING && !self.output_encoding.is_empty() {
            return Ok(self.output_encoding.clone());
        }
        properties
            .get(name)
            .map(|value| self.encoder.encode_property(name, value))
            .ok_or_else(|| {
                Error::merge(format!("resource `{resource_id}` has no property `{name}`"))
            })
    }

    /// Renders a container for the output locale: target parts in their
    /// visual order, falling back per part to the source when a target part
    /// is still empty.
    fn render_container(
        &self,
        container: &TextContainer,
        locale: Option<&LocaleId>,
        unit_id: &str,
    ) -> Result<String, Error> {
        let Some(locale) = locale else {
            return Ok(self.render_source(container));
        };
        let Some(target) = container.target(locale) else {
            warn!(unit = unit_id, locale = %locale, "no target content; using source");
            return Ok(self.render_source(container));
        };
        let source = container.parts();
        if target.len() != source.len() {
            return Err(Error::merge(format!(
                "target part count mismatch for `{unit_id}` in `{locale}`: {} source parts, {} target parts",
                source.len(),
                target.len()
            )));
        }
        // visual order: explicit order index when set, own position otherwise
        let mut order: Vec<usize> = (0..target.len()).collect();
        order.sort_by_key(|&j| {
            if target[j].target_order != 0 {
                target[j].target_order
            } else {
                j as i32 + 1
            }
        });
        let mut out = String::new();
        for j in order {
            let part = &target[j];
            if part.content.is_empty() && !source[j].content.is_empty() {
                warn!(
                    unit = unit_id,
                    locale = %locale,
                    part = j,
                    "empty target part; using source"
                );
                out.push_str(&self.render_fragment(&source[j].content));
            } else {
                out.push_str(&self.render_fragment(&part.content));
            }
        }
        Ok(out)
    }

    fn render_source(&self, container: &TextContainer) -> String {
        let mut out = String::new();
        for part in container.parts() {
            out.push_str(&self.render_fragment(&part.content));
        }
        out
    }

    /// Literal text runs go through the encoder; inline-code data is
    /// original bytes and stays as stored.
    fn render_fragment(&self, fragment: &TextFragment) -> String {
        fragment.to_text_with(|run| self.encoder.encode(run).into_owned())
    }
}

impl SkeletonWriter for GenericSkeletonWriter {
    fn process_start_document(
        &mut self,
        output_locale: Option<LocaleId>,
        output_encoding: &str,
        resource: &StartDocument,
    ) -> Result<String, Error> {
        self.output_locale = output_locale;
        self.output_encoding = output_encoding.to_string();
        self.multilingual = resource.multilingual;
        self.referents.clear();
        self.captures.clear();
        self.group_depth = 0;
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        Ok(rendered)
    }

    fn process_end_document(&mut self, resource: &Ending) -> Result<String, Error> {
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        self.deliver(rendered)
    }

    fn process_start_sub_document(
        &mut self,
        resource: &StartSubDocument,
    ) -> Result<String, Error> {
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        self.deliver(rendered)
    }

    fn process_end_sub_document(&mut self, resource: &Ending) -> Result<String, Error> {
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        self.deliver(rendered)
    }

    fn process_start_group(&mut self, resource: &StartGroup) -> Result<String, Error> {
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        self.group_depth += 1;
        if resource.is_referent {
            self.captures.push(Capture {
                id: resource.id.clone(),
                properties: resource.properties.clone(),
                depth: self.group_depth,
                buffer: rendered,
            });
            Ok(String::new())
        } else {
            self.deliver(rendered)
        }
    }

    fn process_end_group(&mut self, resource: &Ending) -> Result<String, Error> {
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        let closing_capture = self
            .captures
            .last()
            .is_some_and(|capture| capture.depth == self.group_depth);
        self.group_depth = self.group_depth.saturating_sub(1);
        if closing_capture && let Some(mut capture) = self.captures.pop() {
            capture.buffer.push_str(&rendered);
            self.referents.insert(
                capture.id,
                Referent::Group {
                    rendered: capture.buffer,
                    properties: capture.properties,
                },
            );
            return Ok(String::new());
        }
        self.deliver(rendered)
    }

    fn process_text_unit(&mut self, resource: &TextUnit) -> Result<String, Error> {
        if resource.is_referent {
            self.referents
                .insert(resource.id.clone(), Referent::Unit(resource.clone()));
            return Ok(String::new());
        }
        let rendered = match &resource.skeleton {
            Some(skeleton) => self.render_skeleton(
                skeleton,
                RenderContext {
                    id: &resource.id,
                    properties: &resource.properties,
                    container: Some(&resource.content),
                },
                0,
            )?,
            None => self.render_container(
                &resource.content,
                self.output_locale.as_ref(),
                &resource.id,
            )?,
        };
        self.deliver(rendered)
    }

    fn process_document_part(&mut self, resource: &DocumentPart) -> Result<String, Error> {
        if resource.is_referent {
            self.referents
                .insert(resource.id.clone(), Referent::Part(resource.clone()));
            return Ok(String::new());
        }
        let rendered = self.render_optional_skeleton(
            resource.skeleton.as_ref(),
            RenderContext {
                id: &resource.id,
                properties: &resource.properties,
                container: None,
            },
        )?;
        self.deliver(rendered)
    }

    fn close(&mut self) {
        self.referents.clear();
        self.captures.clear();
        self.group_depth = 0;
        self.output_locale = None;
        self.output_encoding.clear();
        self.multilingual = false;
    }
}
