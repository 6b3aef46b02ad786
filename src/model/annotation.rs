//! Annotation element values
//!
//! Each pair is owned by the binding it annotates and owns its value
//! constant.

use std::any::Any;

use super::binding::BindingRecord;
use super::constant::{Constant, ConstantKinds, Slot};
use super::index::CodeIndex;
use super::tags;
use crate::error::NodeResult;
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{Kind, KindBuilder, ManyToOne, OneToOne, Ownership, SchemaResult, StringField};
use crate::store::Address;

pub(crate) struct AnnotationKinds {
    pub(crate) kind: Kind,
    pub(crate) owner: ManyToOne,
    pub(crate) name: StringField,
    pub(crate) value: OneToOne,
}

impl AnnotationKinds {
    pub(crate) fn declare(
        types: &mut NodeTypeRegistry,
        constants: &ConstantKinds,
    ) -> SchemaResult<Self> {
        let mut builder = KindBuilder::node("AnnotationValuePair");
        let owner = builder.add_many_to_one("owner", Ownership::OwnedByReferent);
        let name = builder.add_string("name");
        let value = builder.add_one_to_one_inverse(
            "value",
            Ownership::Reference,
            &constants.parent_annotation_value,
        )?;
        let kind = builder.finish();
        types.register(tags::ANNOTATION_VALUE_PAIR, &kind, |address| {
            Box::new(AnnotationValuePair { address })
        })?;
        Ok(Self {
            kind,
            owner,
            name,
            value,
        })
    }
}

/// `name = value` element of an annotation on a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationValuePair {
    address: Address,
}

impl AnnotationValuePair {
    pub(crate) fn at(address: Address) -> Self {
        Self { address }
    }

    /// Creates a pair owned by `owner`.
    pub fn create<B: BindingRecord>(index: &mut CodeIndex, owner: &B, name: &str) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let k = &schema.annotation;
        let address = db.allocate(&k.kind)?;
        k.name.put(db.store_mut(), address, name)?;
        k.owner.put(db, address, Some(owner.address()))?;
        Ok(Self { address })
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().annotation.kind)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().annotation;
        Ok(k.name.get(index.db().store(), self.address)?)
    }

    /// The annotated binding
    pub fn owner(&self, index: &CodeIndex) -> NodeResult<Option<Box<dyn Node>>> {
        let k = &index.schema().annotation;
        match k.owner.get(index.db().store(), self.address)? {
            Some(owner) => Ok(Some(index.db().load(owner)?)),
            None => Ok(None),
        }
    }

    pub fn value(&self, index: &CodeIndex) -> NodeResult<Option<Constant>> {
        let k = &index.schema().annotation;
        match k.value.get(index.db().store(), self.address)? {
            Some(value) => Ok(Some(Constant::from_address(index, value)?)),
            None => Ok(None),
        }
    }

    /// Replaces the value. The previous value is deleted; the new one is
    /// detached from any other parent.
    pub fn set_value(&self, index: &mut CodeIndex, value: Option<Constant>) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema
            .annotation
            .value
            .put(db, self.address, value.map(|v| v.address()))?;
        match value {
            Some(value) => value.clear_other_parents(index, Slot::Annotation),
            None => Ok(()),
        }
    }

    pub fn delete(self, index: &mut CodeIndex) -> NodeResult<()> {
        index.delete(self.address)
    }
}

impl Node for AnnotationValuePair {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::ANNOTATION_VALUE_PAIR
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
