// ── Static interface descriptions ──
//
// An `InterfaceSpec` is built once per interface type (behind a
// `LazyLock`) and shared by every object that composes it. It maps
// logical method names onto wire verbs and codecs, and names the pushed
// categories the interface understands.

use std::fmt;

use crate::error::CoreError;
use crate::model::{Codec, Value, Vid};

/// Property updates decoded from one reply or pushed event.
pub type Updates = Vec<(&'static str, Value)>;

/// Decodes the arguments of one pushed category event.
pub type CategoryHandler = fn(&[String]) -> Result<Updates, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Getter,
    Setter,
}

/// One remote method, with its cached and hardware wire variants.
///
/// Getters default to the cached verb (`GetState`) and switch to the
/// hardware verb (`GetStateHW`) on request. Setters default to the
/// hardware verb (`SetState`) and switch to the cached verb
/// (`SetStateSW`) on request.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: MethodKind,
    pub cached_verb: Option<&'static str>,
    pub hardware_verb: &'static str,
    pub args: Vec<Codec>,
    /// Getter result codec. Setters return a bare return code.
    pub result: Option<Codec>,
    /// Cache slot this method reads or writes.
    pub property: Option<&'static str>,
}

impl MethodDescriptor {
    /// The verb to send: the hardware variant when `hardware` is set or
    /// no cached variant exists.
    pub fn verb(&self, hardware: bool) -> &'static str {
        match self.cached_verb {
            Some(cached) if !hardware => cached,
            _ => self.hardware_verb,
        }
    }

    /// Returns `true` if `verb` is either wire variant of this method.
    pub fn answers_to(&self, verb: &str) -> bool {
        self.hardware_verb == verb || self.cached_verb == Some(verb)
    }

    /// Verb selection for a typed call: getters take `hw`, setters take `sw`.
    pub fn verb_for(&self, flag: bool) -> &'static str {
        match self.kind {
            MethodKind::Getter => self.verb(flag),
            MethodKind::Setter => self.verb(!flag),
        }
    }
}

/// An ad hoc command that fetches extra state outside `INVOKE`
/// (e.g. `GETLED <vid>`).
#[derive(Clone, Copy)]
pub struct RawFetch {
    pub command: fn(Vid) -> String,
    /// Decodes the tokens of the terminal reply line.
    pub parse: fn(Vid, &[String]) -> Result<Updates, CoreError>,
}

impl fmt::Debug for RawFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFetch").finish_non_exhaustive()
    }
}

/// Immutable description of one interface type.
pub struct InterfaceSpec {
    name: &'static str,
    properties: Vec<&'static str>,
    methods: Vec<MethodDescriptor>,
    categories: Vec<(&'static str, CategoryHandler)>,
    raw_fetch: Option<RawFetch>,
}

impl fmt::Debug for InterfaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(|m| m.name).collect();
        let categories: Vec<&str> = self.categories.iter().map(|(c, _)| *c).collect();
        f.debug_struct("InterfaceSpec")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("methods", &methods)
            .field("categories", &categories)
            .finish_non_exhaustive()
    }
}

impl InterfaceSpec {
    pub fn builder(name: &'static str) -> InterfaceSpecBuilder {
        InterfaceSpecBuilder {
            spec: Self {
                name,
                properties: Vec::new(),
                methods: Vec::new(),
                categories: Vec::new(),
                raw_fetch: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared property slots, in declaration order.
    pub fn properties(&self) -> &[&'static str] {
        &self.properties
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains(&property)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up a method by logical name or by either wire verb.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.methods.iter().find(|m| m.answers_to(name)))
    }

    /// Getters bound to a cache slot; `fetch_state` calls each of these.
    pub fn cached_getters(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods
            .iter()
            .filter(|m| m.kind == MethodKind::Getter && m.property.is_some())
    }

    /// Pushed categories this interface decodes.
    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.categories.iter().map(|(c, _)| *c)
    }

    pub fn category_handler(&self, category: &str) -> Option<CategoryHandler> {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, handler)| *handler)
    }

    pub fn raw_fetch(&self) -> Option<RawFetch> {
        self.raw_fetch
    }
}

/// Builder for [`InterfaceSpec`].
pub struct InterfaceSpecBuilder {
    spec: InterfaceSpec,
}

impl InterfaceSpecBuilder {
    /// Declare a property slot with no bound getter.
    pub fn property(mut self, property: &'static str) -> Self {
        if !self.spec.has_property(property) {
            self.spec.properties.push(property);
        }
        self
    }

    /// Declare a getter: `name` is the cached verb, `hardware` the HW verb.
    pub fn getter(
        mut self,
        name: &'static str,
        hardware: &'static str,
        result: Codec,
        property: Option<&'static str>,
    ) -> Self {
        if let Some(property) = property {
            self = self.property(property);
        }
        self.spec.methods.push(MethodDescriptor {
            name,
            kind: MethodKind::Getter,
            cached_verb: Some(name),
            hardware_verb: hardware,
            args: Vec::new(),
            result: Some(result),
            property,
        });
        self
    }

    /// Declare a setter: `name` is the hardware verb, `cached` the SW verb.
    /// When bound to a property, the first argument is the written value.
    pub fn setter(
        mut self,
        name: &'static str,
        cached: &'static str,
        args: &[Codec],
        property: Option<&'static str>,
    ) -> Self {
        if let Some(property) = property {
            self = self.property(property);
        }
        self.spec.methods.push(MethodDescriptor {
            name,
            kind: MethodKind::Setter,
            cached_verb: Some(cached),
            hardware_verb: name,
            args: args.to_vec(),
            result: None,
            property,
        });
        self
    }

    /// Decode pushed `S:<category>` events with `handler`.
    pub fn category(mut self, category: &'static str, handler: CategoryHandler) -> Self {
        self.spec.categories.push((category, handler));
        self
    }

    pub fn raw_fetch(mut self, raw_fetch: RawFetch) -> Self {
        self.spec.raw_fetch = Some(raw_fetch);
        self
    }

    pub fn build(self) -> InterfaceSpec {
        self.spec
    }
}
