//! Compiler bindings
//!
//! `Binding` is an abstract layout shared by methods and variables. Every
//! binding is owned by the resource file it was read from and owns its
//! annotation values.

use std::any::Any;

use super::annotation::{AnnotationKinds, AnnotationValuePair};
use super::constant::{Constant, ConstantKinds, Slot};
use super::index::CodeIndex;
use super::parameter::{MethodParameter, ParameterKinds};
use super::resource::ResourceFile;
use super::tags;
use crate::error::NodeResult;
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{
    IntField, Kind, KindBuilder, ListField, LongField, ManyToOne, OneToMany, OneToOne, Ownership,
    SchemaResult, StringField,
};
use crate::store::Address;

pub(crate) struct BindingKinds {
    pub(crate) binding: Kind,
    pub(crate) modifiers: LongField,
    pub(crate) file: ManyToOne,
    pub(crate) annotation_values: OneToMany,

    pub(crate) method: Kind,
    pub(crate) method_name: StringField,
    pub(crate) method_flags: IntField,
    pub(crate) parameters: ListField,
    pub(crate) default_value: OneToOne,

    pub(crate) variable: Kind,
    pub(crate) variable_name: StringField,
    pub(crate) variable_flags: IntField,
    pub(crate) variable_constant: OneToOne,
}

impl BindingKinds {
    pub(crate) fn declare(
        types: &mut NodeTypeRegistry,
        constants: &ConstantKinds,
        parameter: &ParameterKinds,
        annotation: &AnnotationKinds,
    ) -> SchemaResult<Self> {
        let mut base = KindBuilder::node("Binding").make_abstract();
        let modifiers = base.add_long("modifiers");
        let file = base.add_many_to_one("file", Ownership::OwnedByReferent);
        let annotation_values = base.add_one_to_many("annotation_values", &annotation.owner)?;
        let binding = base.finish();

        let mut builder = KindBuilder::extending("Method", &binding);
        let method_name = builder.add_string("name");
        let method_flags = builder.add_int("flags");
        let parameters = builder.add_list("parameters", &parameter.kind)?;
        let default_value = builder.add_one_to_one_inverse(
            "default_value",
            Ownership::Reference,
            &constants.parent_method,
        )?;
        let method = builder.finish();
        types.register(tags::METHOD, &method, |address| Box::new(Method { address }))?;

        let mut builder = KindBuilder::extending("Variable", &binding);
        let variable_name = builder.add_string("name");
        let variable_flags = builder.add_int("flags");
        let variable_constant = builder.add_one_to_one_inverse(
            "constant",
            Ownership::Reference,
            &constants.parent_variable,
        )?;
        let variable = builder.finish();
        types.register(tags::VARIABLE, &variable, |address| {
            Box::new(Variable { address })
        })?;

        Ok(Self {
            binding,
            modifiers,
            file,
            annotation_values,
            method,
            method_name,
            method_flags,
            parameters,
            default_value,
            variable,
            variable_name,
            variable_flags,
            variable_constant,
        })
    }
}

/// Fields every binding carries.
pub trait BindingRecord: Node {
    fn modifiers(&self, index: &CodeIndex) -> NodeResult<i64> {
        let k = &index.schema().binding;
        Ok(k.modifiers.get(index.db().store(), self.address())?)
    }

    fn set_modifiers(&self, index: &mut CodeIndex, modifiers: i64) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema
            .binding
            .modifiers
            .put(db.store_mut(), self.address(), modifiers)?)
    }

    /// The file this binding was read from
    fn file(&self, index: &CodeIndex) -> NodeResult<Option<ResourceFile>> {
        let k = &index.schema().binding;
        Ok(k.file
            .get(index.db().store(), self.address())?
            .map(ResourceFile::at))
    }

    /// Moves the binding to `file`. Clearing the file deletes the binding.
    fn set_file(&self, index: &mut CodeIndex, file: Option<&ResourceFile>) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema
            .binding
            .file
            .put(db, self.address(), file.map(|f| f.address()))
    }

    fn annotation_values(&self, index: &CodeIndex) -> NodeResult<Vec<AnnotationValuePair>> {
        let k = &index.schema().binding;
        Ok(k.annotation_values
            .to_vec(index.db().store(), self.address())?
            .into_iter()
            .map(AnnotationValuePair::at)
            .collect())
    }
}

/// A method binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    address: Address,
}

impl Method {
    pub(crate) fn at(address: Address) -> Self {
        Self { address }
    }

    /// Creates a method owned by `file`.
    pub fn create(index: &mut CodeIndex, file: &ResourceFile, name: &str) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let k = &schema.binding;
        let address = db.allocate(&k.method)?;
        k.method_name.put(db.store_mut(), address, name)?;
        let method = Self { address };
        method.set_file(index, Some(file))?;
        Ok(method)
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().binding.method)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().binding;
        Ok(k.method_name.get(index.db().store(), self.address)?)
    }

    pub fn flags(&self, index: &CodeIndex) -> NodeResult<i32> {
        let k = &index.schema().binding;
        Ok(k.method_flags.get(index.db().store(), self.address)?)
    }

    pub fn set_flags(&self, index: &mut CodeIndex, flags: i32) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema
            .binding
            .method_flags
            .put(db.store_mut(), self.address, flags)?)
    }

    /// Appends an empty parameter.
    pub fn create_new_parameter(&self, index: &mut CodeIndex) -> NodeResult<MethodParameter> {
        let (schema, db) = index.parts_mut();
        let element = schema.binding.parameters.append(db.store_mut(), self.address)?;
        Ok(MethodParameter::at(element))
    }

    /// Reserves room for `count` more parameters.
    pub fn allocate_parameters(&self, index: &mut CodeIndex, count: u32) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema
            .binding
            .parameters
            .allocate(db.store_mut(), self.address, count)?)
    }

    pub fn parameters(&self, index: &CodeIndex) -> NodeResult<Vec<MethodParameter>> {
        let k = &index.schema().binding;
        Ok(k.parameters
            .elements(index.db().store(), self.address)?
            .into_iter()
            .map(MethodParameter::at)
            .collect())
    }

    pub fn default_value(&self, index: &CodeIndex) -> NodeResult<Option<Constant>> {
        let k = &index.schema().binding;
        match k.default_value.get(index.db().store(), self.address)? {
            Some(value) => Ok(Some(Constant::from_address(index, value)?)),
            None => Ok(None),
        }
    }

    /// Replaces the default value. The previous value is deleted; the new
    /// one is detached from any other parent.
    pub fn set_default_value(&self, index: &mut CodeIndex, value: Option<Constant>) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema
            .binding
            .default_value
            .put(db, self.address, value.map(|v| v.address()))?;
        match value {
            Some(value) => value.clear_other_parents(index, Slot::Method),
            None => Ok(()),
        }
    }

    pub fn delete(self, index: &mut CodeIndex) -> NodeResult<()> {
        index.delete(self.address)
    }
}

impl Node for Method {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::METHOD
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BindingRecord for Method {}

/// A field or local variable binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    address: Address,
}

impl Variable {
    pub(crate) fn at(address: Address) -> Self {
        Self { address }
    }

    /// Creates a variable owned by `file`.
    pub fn create(index: &mut CodeIndex, file: &ResourceFile, name: &str) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let k = &schema.binding;
        let address = db.allocate(&k.variable)?;
        k.variable_name.put(db.store_mut(), address, name)?;
        let variable = Self { address };
        variable.set_file(index, Some(file))?;
        Ok(variable)
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().binding.variable)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().binding;
        Ok(k.variable_name.get(index.db().store(), self.address)?)
    }

    pub fn flags(&self, index: &CodeIndex) -> NodeResult<i32> {
        let k = &index.schema().binding;
        Ok(k.variable_flags.get(index.db().store(), self.address)?)
    }

    pub fn set_flags(&self, index: &mut CodeIndex, flags: i32) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema
            .binding
            .variable_flags
            .put(db.store_mut(), self.address, flags)?)
    }

    pub fn constant(&self, index: &CodeIndex) -> NodeResult<Option<Constant>> {
        let k = &index.schema().binding;
        match k.variable_constant.get(index.db().store(), self.address)? {
            Some(value) => Ok(Some(Constant::from_address(index, value)?)),
            None => Ok(None),
        }
    }

    /// Replaces the stored constant. The previous constant is deleted; the
    /// new one is detached from any other parent.
    pub fn set_constant(&self, index: &mut CodeIndex, value: Option<Constant>) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema
            .binding
            .variable_constant
            .put(db, self.address, value.map(|v| v.address()))?;
        match value {
            Some(value) => value.clear_other_parents(index, Slot::Variable),
            None => Ok(()),
        }
    }

    pub fn delete(self, index: &mut CodeIndex) -> NodeResult<()> {
        index.delete(self.address)
    }
}

impl Node for Variable {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::VARIABLE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl BindingRecord for Variable {}
