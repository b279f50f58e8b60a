//! The annotatable-type registry: dynamic, process-wide interned type
//! families.
//!
//! Annotation, attribute, and relation types are not fixed enums. Components
//! mint them at runtime by name, and two `create` calls with the same
//! normalized name always yield the *same* interned value, so type identity
//! is the registry key rather than language-level enum identity.
//!
//! Three families exist, each with its own intern table:
//!
//! - [`AnnotationType`]: hierarchical (every type has a parent, defaulting
//!   to [`AnnotationType::root`]), carries declared attributes inherited
//!   from the parent, and supports gold-standard duality: the name sigil
//!   `@` marks the human-verified counterpart of an automatically produced
//!   type. Duals share all structural facts through the non-gold form.
//! - [`AttributeType`]: a name plus a declared [`ValueKind`] used for
//!   type-checking attribute values.
//! - [`RelationType`]: a flat named family for typed edges.
//!
//! Names are normalized (case-insensitive, separator-insensitive) before
//! interning: `partOfSpeech`, `PART_OF_SPEECH`, and `part-of-speech` are the
//! same type. Registration is safe under concurrent first-use; once
//! registered, a type's structural facts are append-only for the life of the
//! process, and redefinition with conflicting structure is a hard error.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved sigil marking gold-standard type names.
pub const GOLD_SIGIL: char = '@';

/// Normalize a type name: trim, uppercase, and squash separator runs
/// (whitespace, `-`, `.`) into single underscores. A leading [`GOLD_SIGIL`]
/// is preserved.
fn normalize(name: &str) -> String {
    let (gold, rest) = match name.trim().strip_prefix(GOLD_SIGIL) {
        Some(rest) => (true, rest),
        None => (false, name.trim()),
    };
    let mut out = String::with_capacity(rest.len() + 1);
    if gold {
        out.push(GOLD_SIGIL);
    }
    let mut pending_sep = false;
    for c in rest.chars() {
        if c.is_whitespace() || c == '-' || c == '.' || c == '_' {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            for u in c.to_uppercase() {
                out.push(u);
            }
        }
    }
    out
}

fn is_blank(normalized: &str) -> bool {
    normalized.is_empty() || normalized == GOLD_SIGIL.to_string().as_str()
}

// =============================================================================
// Intern table
// =============================================================================

/// A single intern table: normalized name -> stable index.
struct Intern<T> {
    by_name: HashMap<Arc<str>, u32>,
    entries: Vec<(Arc<str>, T)>,
}

impl<T> Intern<T> {
    fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn lookup(&self, normalized: &str) -> Option<u32> {
        self.by_name.get(normalized).copied()
    }

    fn insert(&mut self, normalized: String, value: T) -> u32 {
        let name: Arc<str> = normalized.into();
        let id = self.entries.len() as u32;
        self.by_name.insert(Arc::clone(&name), id);
        self.entries.push((name, value));
        id
    }

    fn name(&self, id: u32) -> Arc<str> {
        Arc::clone(&self.entries[id as usize].0)
    }

    fn get(&self, id: u32) -> &T {
        &self.entries[id as usize].1
    }

    fn get_mut(&mut self, id: u32) -> &mut T {
        &mut self.entries[id as usize].1
    }

    fn ids(&self) -> std::ops::Range<u32> {
        0..self.entries.len() as u32
    }
}

// =============================================================================
// Annotation types
// =============================================================================

struct AnnotationInfo {
    /// Parent id; `None` only for ROOT itself. Gold entries store their
    /// non-gold dual here and never carry structure of their own.
    parent: Option<u32>,
    /// Attributes configured directly on this type, in declaration order.
    configured: Vec<AttributeType>,
    /// Memoized union of configured attributes and the parent's declared
    /// attributes. Computed once; structure is frozen afterwards.
    declared: Option<Arc<[AttributeType]>>,
}

static ANNOTATION_TYPES: Lazy<RwLock<Intern<AnnotationInfo>>> = Lazy::new(|| {
    let mut intern = Intern::new();
    intern.insert(
        "ROOT".to_string(),
        AnnotationInfo {
            parent: None,
            configured: Vec::new(),
            declared: None,
        },
    );
    RwLock::new(intern)
});

const ROOT_ID: u32 = 0;

/// A dynamically created, interned annotation type.
///
/// Copyable handle; identity is the registry key. Two handles are equal iff
/// they intern the same normalized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationType(u32);

impl AnnotationType {
    /// The universal ROOT type terminating every parent chain.
    #[must_use]
    pub fn root() -> Self {
        Lazy::force(&ANNOTATION_TYPES);
        AnnotationType(ROOT_ID)
    }

    /// Create a new annotation type or return the existing one for the
    /// given name. The parent defaults to ROOT.
    pub fn create(name: &str) -> Result<Self> {
        Self::create_impl(name, None)
    }

    /// Create a new annotation type with an explicit parent, or return the
    /// existing one. Fails if the name is already bound to a different
    /// parent, or if the parent assignment would form a cycle.
    pub fn create_with_parent(name: &str, parent: AnnotationType) -> Result<Self> {
        Self::create_impl(name, Some(parent))
    }

    fn create_impl(name: &str, parent: Option<AnnotationType>) -> Result<Self> {
        let normalized = normalize(name);
        if is_blank(&normalized) {
            return Err(Error::config(format!(
                "'{name}' is not a valid annotation type name"
            )));
        }

        // Fast path: already registered and structurally compatible.
        {
            let table = ANNOTATION_TYPES.read();
            if let Some(id) = table.lookup(&normalized) {
                drop(table);
                let existing = AnnotationType(id);
                if let Some(p) = parent {
                    existing.check_parent_compatible(p, name)?;
                }
                return Ok(existing);
            }
        }

        let mut table = ANNOTATION_TYPES.write();
        // Double-checked: another thread may have registered between locks.
        if let Some(id) = table.lookup(&normalized) {
            drop(table);
            let existing = AnnotationType(id);
            if let Some(p) = parent {
                existing.check_parent_compatible(p, name)?;
            }
            return Ok(existing);
        }

        // Gold entries carry no structure; the non-gold dual holds it. The
        // dual is registered eagerly so structural lookups always resolve.
        if normalized.starts_with(GOLD_SIGIL) {
            let base = normalized[GOLD_SIGIL.len_utf8()..].to_string();
            let base_id = match table.lookup(&base) {
                Some(id) => id,
                None => {
                    let resolved = resolve_parent_id(&table, parent)?;
                    table.insert(
                        base,
                        AnnotationInfo {
                            parent: Some(resolved),
                            configured: Vec::new(),
                            declared: None,
                        },
                    )
                }
            };
            if let Some(p) = parent {
                let current = table.get(base_id).parent.unwrap_or(ROOT_ID);
                if current != p.non_gold_standard_id(&table) {
                    return Err(Error::config(format!(
                        "attempting to register annotation type '{name}' with a different parent"
                    )));
                }
            }
            let id = table.insert(
                normalized,
                AnnotationInfo {
                    parent: Some(base_id),
                    configured: Vec::new(),
                    declared: None,
                },
            );
            return Ok(AnnotationType(id));
        }

        let parent_id = resolve_parent_id(&table, parent)?;
        let id = table.insert(
            normalized,
            AnnotationInfo {
                parent: Some(parent_id),
                configured: Vec::new(),
                declared: None,
            },
        );
        Ok(AnnotationType(id))
    }

    fn check_parent_compatible(self, parent: AnnotationType, name: &str) -> Result<()> {
        if self.parent() != parent.non_gold_standard_version() {
            return Err(Error::config(format!(
                "attempting to register annotation type '{name}' with a different parent \
                 (existing parent is '{}')",
                self.parent().name()
            )));
        }
        Ok(())
    }

    fn non_gold_standard_id(self, table: &Intern<AnnotationInfo>) -> u32 {
        let name = table.name(self.0);
        if name.starts_with(GOLD_SIGIL) {
            // Gold entries store their dual as parent.
            table.get(self.0).parent.unwrap_or(ROOT_ID)
        } else {
            self.0
        }
    }

    /// Whether an annotation type is registered under the given name.
    #[must_use]
    pub fn is_defined(name: &str) -> bool {
        ANNOTATION_TYPES.read().lookup(&normalize(name)).is_some()
    }

    /// Look up an annotation type by name; fails if undefined.
    pub fn value_of(name: &str) -> Result<Self> {
        ANNOTATION_TYPES
            .read()
            .lookup(&normalize(name))
            .map(AnnotationType)
            .ok_or_else(|| Error::config(format!("'{name}' is not a defined annotation type")))
    }

    /// Snapshot of all registered annotation types.
    #[must_use]
    pub fn values() -> Vec<Self> {
        ANNOTATION_TYPES.read().ids().map(AnnotationType).collect()
    }

    /// Normalized name of this type (gold types keep their `@` sigil).
    #[must_use]
    pub fn name(&self) -> Arc<str> {
        ANNOTATION_TYPES.read().name(self.0)
    }

    /// Whether this is a gold-standard type.
    #[must_use]
    pub fn is_gold_standard(&self) -> bool {
        self.name().starts_with(GOLD_SIGIL)
    }

    /// The gold-standard dual of this type (self if already gold).
    #[must_use]
    pub fn gold_standard_version(&self) -> Self {
        if self.is_gold_standard() {
            return *self;
        }
        let gold = format!("{}{}", GOLD_SIGIL, self.name());
        // The name is already normalized and non-blank, so this cannot fail.
        Self::create(&gold).unwrap_or(*self)
    }

    /// The non-gold-standard dual of this type (self if already non-gold).
    #[must_use]
    pub fn non_gold_standard_version(&self) -> Self {
        let table = ANNOTATION_TYPES.read();
        AnnotationType(self.non_gold_standard_id(&table))
    }

    /// Parent type. ROOT is its own parent; parent lookups resolve through
    /// the non-gold dual.
    #[must_use]
    pub fn parent(&self) -> Self {
        let table = ANNOTATION_TYPES.read();
        let base = self.non_gold_standard_id(&table);
        AnnotationType(table.get(base).parent.unwrap_or(ROOT_ID))
    }

    /// Checks whether this type is an instance of another: true if they are
    /// equal, their gold duals are equal, or walking the parent chain (which
    /// terminates at ROOT) reaches `other` or its dual.
    #[must_use]
    pub fn is_instance(&self, other: AnnotationType) -> bool {
        if *self == other || self.non_gold_standard_version() == other.non_gold_standard_version()
        {
            return true;
        }
        let target = other.non_gold_standard_version();
        let root = Self::root();
        let mut cursor = self.non_gold_standard_version();
        while cursor != root {
            let parent = cursor.parent();
            if parent == cursor {
                break;
            }
            if parent == target {
                return true;
            }
            cursor = parent;
        }
        target == root
    }

    /// Declare attributes for this type. Append-only; fails once the
    /// declared set has been memoized, since structure is frozen from then
    /// on.
    pub fn define_attributes(&self, attributes: &[AttributeType]) -> Result<()> {
        let mut table = ANNOTATION_TYPES.write();
        let base = self.non_gold_standard_id(&table);
        let info = table.get_mut(base);
        if info.declared.is_some() {
            return Err(Error::config(format!(
                "attributes of annotation type '{}' are frozen",
                table.name(base)
            )));
        }
        for a in attributes {
            if !info.configured.contains(a) {
                info.configured.push(*a);
            }
        }
        Ok(())
    }

    /// The attributes declared for this type: the union of its own
    /// configured attributes and the parent's declared attributes, walking
    /// up to ROOT. Memoized on first access.
    #[must_use]
    pub fn declared_attributes(&self) -> Vec<AttributeType> {
        let base = {
            let table = ANNOTATION_TYPES.read();
            let base = self.non_gold_standard_id(&table);
            if let Some(declared) = &table.get(base).declared {
                return declared.to_vec();
            }
            base
        };
        // Compute outside the lock: the parent's declared set may itself
        // need memoizing and re-enters this function.
        let parent = AnnotationType(base).parent();
        let mut union: Vec<AttributeType> = {
            let table = ANNOTATION_TYPES.read();
            table.get(base).configured.clone()
        };
        if parent.0 != base {
            for a in parent.declared_attributes() {
                if !union.contains(&a) {
                    union.push(a);
                }
            }
        }
        let mut table = ANNOTATION_TYPES.write();
        let info = table.get_mut(base);
        if info.declared.is_none() {
            info.declared = Some(union.clone().into());
        }
        union
    }
}

fn resolve_parent_id(
    table: &Intern<AnnotationInfo>,
    parent: Option<AnnotationType>,
) -> Result<u32> {
    let Some(parent) = parent else {
        return Ok(ROOT_ID);
    };
    // Walk the proposed parent chain; it must already terminate at ROOT, so
    // a cycle through a registered id cannot form here, but a stale handle
    // is still rejected.
    let mut cursor = parent.non_gold_standard_id(table);
    let mut steps = 0usize;
    while cursor != ROOT_ID {
        cursor = table.get(cursor).parent.unwrap_or(ROOT_ID);
        steps += 1;
        if steps > table.ids().len() {
            return Err(Error::config(
                "cyclic parent assignment in annotation type hierarchy",
            ));
        }
    }
    Ok(parent.non_gold_standard_id(table))
}

impl std::fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Attribute types
// =============================================================================

/// Declared value kind of an attribute, used for type-checking and codec
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// UTF-8 string (the default kind)
    String,
    /// Signed integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// Calendar date, ISO-8601 `YYYY-MM-DD`
    Date,
    /// Enumeration tag: a string drawn from a closed label set
    Tag,
}

impl ValueKind {
    /// Lowercase name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
            ValueKind::Tag => "tag",
        }
    }
}

static ATTRIBUTE_TYPES: Lazy<RwLock<Intern<ValueKind>>> = Lazy::new(|| RwLock::new(Intern::new()));

/// A dynamically created, interned attribute type: a name plus a declared
/// value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeType(u32);

impl AttributeType {
    /// Create an attribute type with the default `String` value kind, or
    /// return the existing one.
    pub fn create(name: &str) -> Result<Self> {
        Self::create_typed_impl(name, None)
    }

    /// Create an attribute type with an explicit value kind. Fails if the
    /// name already exists with a different kind.
    pub fn create_typed(name: &str, kind: ValueKind) -> Result<Self> {
        Self::create_typed_impl(name, Some(kind))
    }

    fn create_typed_impl(name: &str, kind: Option<ValueKind>) -> Result<Self> {
        let normalized = normalize(name);
        if is_blank(&normalized) {
            return Err(Error::config(format!(
                "'{name}' is not a valid attribute type name"
            )));
        }
        {
            let table = ATTRIBUTE_TYPES.read();
            if let Some(id) = table.lookup(&normalized) {
                if let Some(kind) = kind {
                    if *table.get(id) != kind {
                        return Err(Error::config(format!(
                            "attempting to register attribute type '{name}' with a new value kind \
                             (existing kind is {})",
                            table.get(id).as_str()
                        )));
                    }
                }
                return Ok(AttributeType(id));
            }
        }
        let mut table = ATTRIBUTE_TYPES.write();
        if let Some(id) = table.lookup(&normalized) {
            if let Some(kind) = kind {
                if *table.get(id) != kind {
                    return Err(Error::config(format!(
                        "attempting to register attribute type '{name}' with a new value kind",
                    )));
                }
            }
            return Ok(AttributeType(id));
        }
        let id = table.insert(normalized, kind.unwrap_or(ValueKind::String));
        Ok(AttributeType(id))
    }

    /// Whether an attribute type is registered under the given name.
    #[must_use]
    pub fn is_defined(name: &str) -> bool {
        ATTRIBUTE_TYPES.read().lookup(&normalize(name)).is_some()
    }

    /// Look up an attribute type by name; fails if undefined.
    pub fn value_of(name: &str) -> Result<Self> {
        ATTRIBUTE_TYPES
            .read()
            .lookup(&normalize(name))
            .map(AttributeType)
            .ok_or_else(|| Error::config(format!("'{name}' is not a defined attribute type")))
    }

    /// Snapshot of all registered attribute types.
    #[must_use]
    pub fn values() -> Vec<Self> {
        ATTRIBUTE_TYPES.read().ids().map(AttributeType).collect()
    }

    /// Normalized name of this attribute type.
    #[must_use]
    pub fn name(&self) -> Arc<str> {
        ATTRIBUTE_TYPES.read().name(self.0)
    }

    /// Declared value kind.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        *ATTRIBUTE_TYPES.read().get(self.0)
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Relation types
// =============================================================================

static RELATION_TYPES: Lazy<RwLock<Intern<()>>> = Lazy::new(|| RwLock::new(Intern::new()));

/// A dynamically created, interned relation type (e.g. a dependency label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationType(u32);

impl RelationType {
    /// Create a relation type or return the existing one.
    pub fn create(name: &str) -> Result<Self> {
        let normalized = normalize(name);
        if is_blank(&normalized) {
            return Err(Error::config(format!(
                "'{name}' is not a valid relation type name"
            )));
        }
        {
            let table = RELATION_TYPES.read();
            if let Some(id) = table.lookup(&normalized) {
                return Ok(RelationType(id));
            }
        }
        let mut table = RELATION_TYPES.write();
        if let Some(id) = table.lookup(&normalized) {
            return Ok(RelationType(id));
        }
        Ok(RelationType(table.insert(normalized, ())))
    }

    /// Whether a relation type is registered under the given name.
    #[must_use]
    pub fn is_defined(name: &str) -> bool {
        RELATION_TYPES.read().lookup(&normalize(name)).is_some()
    }

    /// Look up a relation type by name; fails if undefined.
    pub fn value_of(name: &str) -> Result<Self> {
        RELATION_TYPES
            .read()
            .lookup(&normalize(name))
            .map(RelationType)
            .ok_or_else(|| Error::config(format!("'{name}' is not a defined relation type")))
    }

    /// Snapshot of all registered relation types.
    #[must_use]
    pub fn values() -> Vec<Self> {
        RELATION_TYPES.read().ids().map(RelationType).collect()
    }

    /// Normalized name of this relation type.
    #[must_use]
    pub fn name(&self) -> Arc<str> {
        RELATION_TYPES.read().name(self.0)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// AnnotatableType: the union over the three families
// =============================================================================

/// Any type that an annotator can satisfy or require, and that a document
/// tracks completion for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotatableType {
    /// An annotation (span) type
    Annotation(AnnotationType),
    /// An attribute type
    Attribute(AttributeType),
    /// A relation type
    Relation(RelationType),
}

impl AnnotatableType {
    /// Name of the underlying type, qualified by family
    /// (`annotation:TOKEN`, `attribute:PART_OF_SPEECH`, ...).
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self {
            AnnotatableType::Annotation(t) => format!("annotation:{}", t.name()),
            AnnotatableType::Attribute(t) => format!("attribute:{}", t.name()),
            AnnotatableType::Relation(t) => format!("relation:{}", t.name()),
        }
    }

    /// Parse a qualified name back into a type, creating it if necessary.
    pub fn from_qualified_name(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("annotation", name)) => Ok(AnnotationType::create(name)?.into()),
            Some(("attribute", name)) => Ok(AttributeType::create(name)?.into()),
            Some(("relation", name)) => Ok(RelationType::create(name)?.into()),
            _ => Err(Error::config(format!(
                "'{s}' is not a qualified annotatable type name"
            ))),
        }
    }
}

impl From<AnnotationType> for AnnotatableType {
    fn from(t: AnnotationType) -> Self {
        AnnotatableType::Annotation(t)
    }
}

impl From<AttributeType> for AnnotatableType {
    fn from(t: AttributeType) -> Self {
        AnnotatableType::Attribute(t)
    }
}

impl From<RelationType> for AnnotatableType {
    fn from(t: RelationType) -> Self {
        AnnotatableType::Relation(t)
    }
}

impl std::fmt::Display for AnnotatableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

// Serde for the interned handles goes through names, so documents survive
// process restarts with a fresh registry.

macro_rules! serde_by_name {
    ($ty:ident, $create:expr) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_str(&self.name())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
                let name = String::deserialize(d)?;
                $create(&name).map_err(D::Error::custom)
            }
        }
    };
}

serde_by_name!(AnnotationType, AnnotationType::create);
serde_by_name!(AttributeType, AttributeType::create);
serde_by_name!(RelationType, RelationType::create);

impl Serialize for AnnotatableType {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.qualified_name())
    }
}

impl<'de> Deserialize<'de> for AnnotatableType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        AnnotatableType::from_qualified_name(&name).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_interns_by_normalized_name() {
        let a = AnnotationType::create("reg_test_token").unwrap();
        let b = AnnotationType::create("REG-TEST-TOKEN").unwrap();
        let c = AnnotationType::create("  reg test token ").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(&*a.name(), "REG_TEST_TOKEN");
    }

    #[test]
    fn blank_names_rejected() {
        assert!(AnnotationType::create("").is_err());
        assert!(AnnotationType::create("   ").is_err());
        assert!(AnnotationType::create("@").is_err());
        assert!(AttributeType::create("").is_err());
        assert!(RelationType::create(" ").is_err());
    }

    #[test]
    fn conflicting_parent_fails() {
        let pa = AnnotationType::create("REG_PARENT_A").unwrap();
        let pb = AnnotationType::create("REG_PARENT_B").unwrap();
        let t = AnnotationType::create_with_parent("REG_CHILD", pa).unwrap();
        assert_eq!(t.parent(), pa);
        assert!(AnnotationType::create_with_parent("REG_CHILD", pb).is_err());
        // Re-registering with the same parent is fine.
        assert_eq!(AnnotationType::create_with_parent("REG_CHILD", pa).unwrap(), t);
    }

    #[test]
    fn parent_defaults_to_root() {
        let t = AnnotationType::create("REG_ORPHAN").unwrap();
        assert_eq!(t.parent(), AnnotationType::root());
        assert_eq!(AnnotationType::root().parent(), AnnotationType::root());
    }

    #[test]
    fn gold_duality_round_trips() {
        let t = AnnotationType::create("REG_ENTITY").unwrap();
        let gold = t.gold_standard_version();
        assert!(gold.is_gold_standard());
        assert!(!t.is_gold_standard());
        assert_eq!(gold.non_gold_standard_version(), t);
        assert_eq!(gold.gold_standard_version(), gold);
        assert_eq!(
            t.gold_standard_version().non_gold_standard_version(),
            t.non_gold_standard_version()
        );
    }

    #[test]
    fn gold_resolves_structure_through_dual() {
        let parent = AnnotationType::create("REG_G_PARENT").unwrap();
        let t = AnnotationType::create_with_parent("REG_G_CHILD", parent).unwrap();
        let gold = t.gold_standard_version();
        assert_eq!(gold.parent(), parent);
        assert!(gold.is_instance(parent));
    }

    #[test]
    fn is_instance_walks_parent_chain() {
        let a = AnnotationType::create("REG_I_A").unwrap();
        let b = AnnotationType::create_with_parent("REG_I_B", a).unwrap();
        let c = AnnotationType::create_with_parent("REG_I_C", b).unwrap();
        assert!(c.is_instance(c));
        assert!(c.is_instance(b));
        assert!(c.is_instance(a));
        assert!(c.is_instance(AnnotationType::root()));
        assert!(!a.is_instance(c));
        assert!(AnnotationType::root().is_instance(AnnotationType::root()));
        // Gold dual matches anywhere in the chain.
        assert!(c.is_instance(a.gold_standard_version()));
        assert!(c.gold_standard_version().is_instance(a));
    }

    #[test]
    fn declared_attributes_inherit_from_parent() {
        let lemma = AttributeType::create("REG_LEMMA").unwrap();
        let pos = AttributeType::create_typed("REG_POS", ValueKind::Tag).unwrap();
        let parent = AnnotationType::create("REG_DA_PARENT").unwrap();
        parent.define_attributes(&[lemma]).unwrap();
        let child = AnnotationType::create_with_parent("REG_DA_CHILD", parent).unwrap();
        child.define_attributes(&[pos]).unwrap();

        let declared = child.declared_attributes();
        assert!(declared.contains(&pos));
        assert!(declared.contains(&lemma));
        // Memoized: structure is frozen after first access.
        assert!(child.define_attributes(&[lemma]).is_err());
    }

    #[test]
    fn attribute_value_kind_conflict_fails() {
        let a = AttributeType::create_typed("REG_CONF", ValueKind::Integer).unwrap();
        assert_eq!(a.value_kind(), ValueKind::Integer);
        assert!(AttributeType::create_typed("REG_CONF", ValueKind::Float).is_err());
        assert_eq!(AttributeType::create("REG_CONF").unwrap(), a);
    }

    #[test]
    fn value_of_fails_when_undefined() {
        assert!(AnnotationType::value_of("REG_NEVER_DEFINED").is_err());
        assert!(AnnotationType::is_defined("ROOT"));
        let t = AnnotationType::create("REG_VO").unwrap();
        assert_eq!(AnnotationType::value_of("reg vo").unwrap(), t);
    }

    #[test]
    fn qualified_names_round_trip() {
        let t: AnnotatableType = AnnotationType::create("REG_QN").unwrap().into();
        let back = AnnotatableType::from_qualified_name(&t.qualified_name()).unwrap();
        assert_eq!(t, back);
        assert!(AnnotatableType::from_qualified_name("bogus").is_err());
    }

    #[test]
    fn concurrent_first_use_registers_once() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| AnnotationType::create("REG_RACE").unwrap()))
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
