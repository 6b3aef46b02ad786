//! Kind descriptors and the kind builder
//!
//! A kind is the finalized binary layout of one record type. Kinds are
//! declared once at startup through a [`KindBuilder`], which is consumed by
//! [`KindBuilder::finish`]; a finished kind cannot gain fields.
//!
//! Node kinds start with the two-byte tag header. Struct kinds have no
//! header and are only embedded as list elements.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::errors::{SchemaError, SchemaResult};
use super::field::{FieldLifecycle, Scalar, ScalarField, StringField};
use super::list::ListField;
use super::relation::{ManyToOne, OneToMany, OneToOne, Ownership, RelationSide};

/// Bytes reserved at the start of every node record for its tag
pub const NODE_HEADER_SIZE: u32 = 2;

static NEXT_KIND_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a declared kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(u32);

impl KindId {
    fn next() -> Self {
        KindId(NEXT_KIND_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Layout family of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFamily {
    /// Tagged top-level records
    Node,
    /// Untagged records embedded in lists
    Struct,
}

/// One declared field of a kind
#[derive(Clone)]
pub struct FieldEntry {
    name: String,
    offset: u32,
    size: u32,
    type_name: &'static str,
    lifecycle: Option<Arc<dyn FieldLifecycle>>,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn lifecycle(&self) -> Option<&Arc<dyn FieldLifecycle>> {
        self.lifecycle.as_ref()
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("type", &self.type_name)
            .finish()
    }
}

struct KindDef {
    id: KindId,
    name: String,
    family: KindFamily,
    is_abstract: bool,
    parent: Option<Kind>,
    size: u32,
    fields: Vec<FieldEntry>,
}

/// A finalized kind. Cloning shares the same descriptor.
#[derive(Clone)]
pub struct Kind(Arc<KindDef>);

impl Kind {
    pub fn id(&self) -> KindId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn family(&self) -> KindFamily {
        self.0.family
    }

    pub fn is_node(&self) -> bool {
        self.0.family == KindFamily::Node
    }

    pub fn is_abstract(&self) -> bool {
        self.0.is_abstract
    }

    pub fn parent(&self) -> Option<&Kind> {
        self.0.parent.as_ref()
    }

    /// Total record size, parent fields included
    pub fn size(&self) -> u32 {
        self.0.size
    }

    /// Fields declared by this kind, without inherited ones
    pub fn own_fields(&self) -> &[FieldEntry] {
        &self.0.fields
    }

    /// All fields in layout order, root ancestor first
    pub fn fields(&self) -> Vec<&FieldEntry> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(kind) = current {
            chain.push(kind);
            current = kind.parent();
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|kind| kind.own_fields().iter())
            .collect()
    }

    /// Returns true if this kind is `other` or one of its descendants.
    pub fn extends(&self, other: &Kind) -> bool {
        self.extends_id(other.id())
    }

    pub fn extends_id(&self, id: KindId) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind.id() == id {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Whether any field can keep records of this kind alive
    pub fn has_owner_fields(&self) -> bool {
        self.fields()
            .iter()
            .filter_map(|f| f.lifecycle())
            .any(|l| l.owns_record())
    }

    /// Serializable description of the layout
    pub fn layout(&self) -> KindLayout {
        KindLayout {
            name: self.name().to_string(),
            family: self.family(),
            is_abstract: self.is_abstract(),
            parent: self.parent().map(|p| p.name().to_string()),
            size: self.size(),
            fields: self
                .own_fields()
                .iter()
                .map(|f| FieldLayout {
                    name: f.name.clone(),
                    offset: f.offset,
                    size: f.size,
                    type_name: f.type_name,
                })
                .collect(),
        }
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("name", &self.0.name)
            .field("family", &self.0.family)
            .field("abstract", &self.0.is_abstract)
            .field("size", &self.0.size)
            .finish()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Layout dump of one kind
#[derive(Debug, Clone, Serialize)]
pub struct KindLayout {
    pub name: String,
    pub family: KindFamily,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub size: u32,
    pub fields: Vec<FieldLayout>,
}

/// Layout dump of one field
#[derive(Debug, Clone, Serialize)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    #[serde(rename = "type")]
    pub type_name: &'static str,
}

/// Declares the fields of a new kind in layout order.
pub struct KindBuilder {
    id: KindId,
    name: String,
    family: KindFamily,
    is_abstract: bool,
    parent: Option<Kind>,
    size: u32,
    fields: Vec<FieldEntry>,
}

impl KindBuilder {
    fn open(name: String, family: KindFamily, parent: Option<Kind>, size: u32) -> Self {
        Self {
            id: KindId::next(),
            name,
            family,
            is_abstract: false,
            parent,
            size,
            fields: Vec::new(),
        }
    }

    /// Root node kind; fields start after the tag header.
    pub fn node(name: impl Into<String>) -> Self {
        Self::open(name.into(), KindFamily::Node, None, NODE_HEADER_SIZE)
    }

    /// Root struct kind for list elements.
    pub fn structure(name: impl Into<String>) -> Self {
        Self::open(name.into(), KindFamily::Struct, None, 0)
    }

    /// Kind appending its fields after all of `parent`'s.
    pub fn extending(name: impl Into<String>, parent: &Kind) -> Self {
        Self::open(
            name.into(),
            parent.family(),
            Some(parent.clone()),
            parent.size(),
        )
    }

    /// Marks the kind as a layout fragment that is never instantiated.
    pub fn make_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn id(&self) -> KindId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the layout declared so far
    pub fn size(&self) -> u32 {
        self.size
    }

    fn push(
        &mut self,
        name: &str,
        size: u32,
        type_name: &'static str,
        lifecycle: Option<Arc<dyn FieldLifecycle>>,
    ) -> u32 {
        let offset = self.size;
        self.fields.push(FieldEntry {
            name: name.to_string(),
            offset,
            size,
            type_name,
            lifecycle,
        });
        self.size += size;
        offset
    }

    fn side(&self, offset: u32) -> RelationSide {
        RelationSide {
            offset,
            kind: self.id,
            kind_name: self.name.clone(),
            is_node: self.family == KindFamily::Node,
        }
    }

    pub fn add_scalar<T: Scalar>(&mut self, name: &str) -> ScalarField<T> {
        let offset = self.push(name, T::SIZE, T::TYPE_NAME, None);
        ScalarField::new(offset)
    }

    pub fn add_bool(&mut self, name: &str) -> ScalarField<bool> {
        self.add_scalar(name)
    }

    pub fn add_byte(&mut self, name: &str) -> ScalarField<i8> {
        self.add_scalar(name)
    }

    pub fn add_short(&mut self, name: &str) -> ScalarField<i16> {
        self.add_scalar(name)
    }

    pub fn add_char(&mut self, name: &str) -> ScalarField<u16> {
        self.add_scalar(name)
    }

    pub fn add_int(&mut self, name: &str) -> ScalarField<i32> {
        self.add_scalar(name)
    }

    pub fn add_long(&mut self, name: &str) -> ScalarField<i64> {
        self.add_scalar(name)
    }

    pub fn add_float(&mut self, name: &str) -> ScalarField<f32> {
        self.add_scalar(name)
    }

    pub fn add_double(&mut self, name: &str) -> ScalarField<f64> {
        self.add_scalar(name)
    }

    pub fn add_string(&mut self, name: &str) -> StringField {
        let field = StringField::new(self.size);
        self.push(name, StringField::SIZE, "string", Some(Arc::new(field)));
        field
    }

    /// Ordered list of embedded `element` records.
    pub fn add_list(&mut self, name: &str, element: &Kind) -> SchemaResult<ListField> {
        if element.is_node() || element.is_abstract() {
            return Err(SchemaError::invalid_list_element(element.name()));
        }
        let field = ListField::new(self.size, element.clone());
        self.push(name, ListField::SIZE, "list", Some(Arc::new(field.clone())));
        Ok(field)
    }

    /// Pointer to a node whose kind declares the matching
    /// [`add_one_to_many`](Self::add_one_to_many).
    pub fn add_many_to_one(&mut self, name: &str, ownership: Ownership) -> ManyToOne {
        let field = ManyToOne::new(
            format!("{}.{}", self.name, name),
            self.size,
            ownership,
            self.family == KindFamily::Node,
        );
        self.push(
            name,
            ManyToOne::SIZE,
            "many_to_one",
            Some(Arc::new(field.clone())),
        );
        field
    }

    /// Backpointer list of every record whose `forward` points here.
    pub fn add_one_to_many(&mut self, name: &str, forward: &ManyToOne) -> SchemaResult<OneToMany> {
        forward.bind(self.side(self.size))?;
        let field = OneToMany::new(self.size, forward.clone());
        self.push(
            name,
            OneToMany::SIZE,
            "one_to_many",
            Some(Arc::new(field.clone())),
        );
        Ok(field)
    }

    /// One side of a one-to-one pair. The other side is declared later with
    /// [`add_one_to_one_inverse`](Self::add_one_to_one_inverse).
    pub fn add_one_to_one(&mut self, name: &str, ownership: Ownership) -> OneToOne {
        let field = OneToOne::new(
            format!("{}.{}", self.name, name),
            ownership,
            self.side(self.size),
        );
        self.push(
            name,
            OneToOne::SIZE,
            "one_to_one",
            Some(Arc::new(field.clone())),
        );
        field
    }

    /// Second side of a one-to-one pair, bound to `inverse`.
    pub fn add_one_to_one_inverse(
        &mut self,
        name: &str,
        ownership: Ownership,
        inverse: &OneToOne,
    ) -> SchemaResult<OneToOne> {
        let field = OneToOne::new(
            format!("{}.{}", self.name, name),
            ownership,
            self.side(self.size),
        );
        OneToOne::pair(&field, inverse)?;
        self.push(
            name,
            OneToOne::SIZE,
            "one_to_one",
            Some(Arc::new(field.clone())),
        );
        Ok(field)
    }

    /// Finalizes the layout.
    pub fn finish(self) -> Kind {
        Kind(Arc::new(KindDef {
            id: self.id,
            name: self.name,
            family: self.family,
            is_abstract: self.is_abstract,
            parent: self.parent,
            size: self.size,
            fields: self.fields,
        }))
    }
}

impl fmt::Debug for KindBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindBuilder")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_fields_start_after_header() {
        let mut builder = KindBuilder::node("Plain");
        let first = builder.add_int("first");
        let second = builder.add_long("second");
        let kind = builder.finish();

        assert_eq!(first.offset(), NODE_HEADER_SIZE);
        assert_eq!(second.offset(), NODE_HEADER_SIZE + 4);
        assert_eq!(kind.size(), NODE_HEADER_SIZE + 12);
    }

    #[test]
    fn test_struct_fields_start_at_zero() {
        let mut builder = KindBuilder::structure("Pair");
        let left = builder.add_short("left");
        builder.add_short("right");
        let kind = builder.finish();
        assert_eq!(left.offset(), 0);
        assert_eq!(kind.size(), 4);
        assert_eq!(kind.family(), KindFamily::Struct);
    }

    #[test]
    fn test_child_starts_at_parent_size() {
        let mut base = KindBuilder::node("Base").make_abstract();
        base.add_int("a");
        base.add_byte("b");
        let base = base.finish();

        let mut child = KindBuilder::extending("Child", &base);
        let name = child.add_string("name");
        let child = child.finish();

        assert_eq!(name.offset(), base.size());
        assert_eq!(child.size(), base.size() + StringField::SIZE);
        assert!(child.extends(&base));
        assert!(!base.extends(&child));
        assert_eq!(child.fields().len(), 3);
        assert_eq!(child.fields()[0].name(), "a");
    }

    #[test]
    fn test_list_rejects_node_elements() {
        let node = KindBuilder::node("Node").finish();
        let mut holder = KindBuilder::node("Holder");
        let err = holder.add_list("items", &node).unwrap_err();
        assert_eq!(
            err.code(),
            super::super::errors::SchemaErrorCode::NdSchemaInvalidListElement
        );
    }

    #[test]
    fn test_layout_dump() {
        let mut builder = KindBuilder::node("Dumped");
        builder.add_double("value");
        let layout = builder.finish().layout();
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["name"], "Dumped");
        assert_eq!(json["family"], "node");
        assert_eq!(json["abstract"], false);
        assert_eq!(json["fields"][0]["type"], "double");
        assert_eq!(json["fields"][0]["offset"], 2);
    }

    #[test]
    fn test_kind_ids_are_unique() {
        let a = KindBuilder::node("Same").finish();
        let b = KindBuilder::node("Same").finish();
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
