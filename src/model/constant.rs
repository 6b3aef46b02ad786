//! Constant values
//!
//! A constant is a small record holding one primitive value. Nine concrete
//! kinds share the abstract `Constant` layout, which carries the four slots
//! through which a parent owns the constant:
//!
//! - an element of a [`ConstantArray`]
//! - the value of an [`AnnotationValuePair`]
//! - the stored value of a [`Variable`]
//! - the default value of a [`Method`]
//!
//! At most one slot is set. Attaching a constant to a parent clears the
//! others, and a constant left without a parent is deleted.

use std::any::Any;
use std::fmt;

use super::annotation::AnnotationValuePair;
use super::binding::{Method, Variable};
use super::index::CodeIndex;
use super::tags;
use crate::db::NodeDb;
use crate::error::{NodeError, NodeResult};
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{
    BoolField, ByteField, CharField, DoubleField, FloatField, IntField, Kind, KindBuilder,
    LongField, ManyToOne, OneToMany, OneToOne, Ownership, Scalar, ScalarField, SchemaResult,
    ShortField, StringField,
};
use crate::store::Address;

/// A constant as seen by the indexer, before or after persisting it.
#[derive(Debug, Clone)]
pub enum RuntimeConstant {
    /// The expression has no compile-time value
    NotAConstant,
    Boolean(bool),
    Byte(i8),
    /// UTF-16 code unit
    Char(u16),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i16),
    String(String),
}

impl PartialEq for RuntimeConstant {
    /// Floating values compare by bit pattern, so `NaN == NaN` and
    /// `0.0 != -0.0`.
    fn eq(&self, other: &Self) -> bool {
        use RuntimeConstant::*;
        match (self, other) {
            (NotAConstant, NotAConstant) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (String(a), String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RuntimeConstant {}

impl fmt::Display for RuntimeConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeConstant::NotAConstant => f.write_str("<not a constant>"),
            RuntimeConstant::Boolean(v) => write!(f, "{}", v),
            RuntimeConstant::Byte(v) => write!(f, "{}", v),
            RuntimeConstant::Char(v) => {
                let c = char::from_u32(*v as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                write!(f, "{:?}", c)
            }
            RuntimeConstant::Double(v) => write!(f, "{}", v),
            RuntimeConstant::Float(v) => write!(f, "{}f", v),
            RuntimeConstant::Int(v) => write!(f, "{}", v),
            RuntimeConstant::Long(v) => write!(f, "{}L", v),
            RuntimeConstant::Short(v) => write!(f, "{}", v),
            RuntimeConstant::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A constant or a nested array of them, as found in annotation values.
#[derive(Debug, Clone, PartialEq)]
pub enum MixedValue {
    Constant(RuntimeConstant),
    Array(Vec<MixedValue>),
}

/// The parent that currently owns a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentSlot {
    ArrayElement(ConstantArray),
    AnnotationValue(AnnotationValuePair),
    VariableValue(Variable),
    MethodDefault(Method),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Array,
    Annotation,
    Variable,
    Method,
}

pub(crate) struct ValueKind<F> {
    pub(crate) kind: Kind,
    pub(crate) value: F,
}

/// Kinds and fields of the constant family
pub(crate) struct ConstantKinds {
    pub(crate) constant: Kind,
    pub(crate) parent_array: ManyToOne,
    pub(crate) parent_annotation_value: OneToOne,
    pub(crate) parent_variable: OneToOne,
    pub(crate) parent_method: OneToOne,
    pub(crate) array: Kind,
    pub(crate) array_elements: OneToMany,
    pub(crate) boolean: ValueKind<BoolField>,
    pub(crate) byte: ValueKind<ByteField>,
    pub(crate) char: ValueKind<CharField>,
    pub(crate) double: ValueKind<DoubleField>,
    pub(crate) float: ValueKind<FloatField>,
    pub(crate) int: ValueKind<IntField>,
    pub(crate) long: ValueKind<LongField>,
    pub(crate) short: ValueKind<ShortField>,
    pub(crate) string: ValueKind<StringField>,
}

impl ConstantKinds {
    pub(crate) fn declare(types: &mut NodeTypeRegistry) -> SchemaResult<Self> {
        let mut base = KindBuilder::node("Constant").make_abstract();
        let parent_array = base.add_many_to_one("parent_array", Ownership::OwnedByReferent);
        let parent_annotation_value =
            base.add_one_to_one("parent_annotation_value", Ownership::OwnedByReferent);
        let parent_variable = base.add_one_to_one("parent_variable", Ownership::OwnedByReferent);
        let parent_method = base.add_one_to_one("parent_method", Ownership::OwnedByReferent);
        let constant = base.finish();

        let mut array = KindBuilder::extending("ConstantArray", &constant);
        let array_elements = array.add_one_to_many("elements", &parent_array)?;
        let array = array.finish();
        types.register(tags::CONSTANT_ARRAY, &array, |address| {
            Box::new(ConstantArray { address })
        })?;

        Ok(Self {
            boolean: declare_value(types, &constant, "ConstantBoolean", tags::CONSTANT_BOOLEAN, |b| {
                b.add_bool("value")
            })?,
            byte: declare_value(types, &constant, "ConstantByte", tags::CONSTANT_BYTE, |b| {
                b.add_byte("value")
            })?,
            char: declare_value(types, &constant, "ConstantChar", tags::CONSTANT_CHAR, |b| {
                b.add_char("value")
            })?,
            double: declare_value(types, &constant, "ConstantDouble", tags::CONSTANT_DOUBLE, |b| {
                b.add_double("value")
            })?,
            float: declare_value(types, &constant, "ConstantFloat", tags::CONSTANT_FLOAT, |b| {
                b.add_float("value")
            })?,
            int: declare_value(types, &constant, "ConstantInt", tags::CONSTANT_INT, |b| {
                b.add_int("value")
            })?,
            long: declare_value(types, &constant, "ConstantLong", tags::CONSTANT_LONG, |b| {
                b.add_long("value")
            })?,
            short: declare_value(types, &constant, "ConstantShort", tags::CONSTANT_SHORT, |b| {
                b.add_short("value")
            })?,
            string: declare_value(types, &constant, "ConstantString", tags::CONSTANT_STRING, |b| {
                b.add_string("value")
            })?,
            constant,
            parent_array,
            parent_annotation_value,
            parent_variable,
            parent_method,
            array,
            array_elements,
        })
    }
}

fn declare_value<F>(
    types: &mut NodeTypeRegistry,
    parent: &Kind,
    name: &str,
    tag: Tag,
    add: impl FnOnce(&mut KindBuilder) -> F,
) -> SchemaResult<ValueKind<F>> {
    let mut builder = KindBuilder::extending(name, parent);
    let value = add(&mut builder);
    let kind = builder.finish();
    types.register(tag, &kind, move |address| Box::new(Constant { address, tag }))?;
    Ok(ValueKind { kind, value })
}

fn store_scalar<T: Scalar>(
    db: &mut NodeDb,
    kind: &ValueKind<ScalarField<T>>,
    tag: Tag,
    value: T,
) -> NodeResult<Constant> {
    let address = db.allocate(&kind.kind)?;
    kind.value.put(db.store_mut(), address, value)?;
    Ok(Constant { address, tag })
}

/// Handle to a persisted constant of any kind, arrays included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    address: Address,
    tag: Tag,
}

impl Constant {
    /// Wraps the record at `address`, checking that it is a constant.
    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().constants.constant)?;
        let tag = index.db().tag_at(address)?;
        Ok(Self { address, tag })
    }

    /// Persists `value`. Returns `None` for [`RuntimeConstant::NotAConstant`].
    pub fn create(index: &mut CodeIndex, value: &RuntimeConstant) -> NodeResult<Option<Self>> {
        let (schema, db) = index.parts_mut();
        let k = &schema.constants;
        let constant = match value {
            RuntimeConstant::NotAConstant => return Ok(None),
            RuntimeConstant::Boolean(v) => store_scalar(db, &k.boolean, tags::CONSTANT_BOOLEAN, *v)?,
            RuntimeConstant::Byte(v) => store_scalar(db, &k.byte, tags::CONSTANT_BYTE, *v)?,
            RuntimeConstant::Char(v) => store_scalar(db, &k.char, tags::CONSTANT_CHAR, *v)?,
            RuntimeConstant::Double(v) => store_scalar(db, &k.double, tags::CONSTANT_DOUBLE, *v)?,
            RuntimeConstant::Float(v) => store_scalar(db, &k.float, tags::CONSTANT_FLOAT, *v)?,
            RuntimeConstant::Int(v) => store_scalar(db, &k.int, tags::CONSTANT_INT, *v)?,
            RuntimeConstant::Long(v) => store_scalar(db, &k.long, tags::CONSTANT_LONG, *v)?,
            RuntimeConstant::Short(v) => store_scalar(db, &k.short, tags::CONSTANT_SHORT, *v)?,
            RuntimeConstant::String(v) => {
                let address = db.allocate(&k.string.kind)?;
                k.string.value.put(db.store_mut(), address, v)?;
                Constant {
                    address,
                    tag: tags::CONSTANT_STRING,
                }
            }
        };
        Ok(Some(constant))
    }

    /// Persists a possibly nested value; arrays become [`ConstantArray`]s
    /// whose elements are created recursively. Elements that are not
    /// constants are skipped.
    pub fn create_from_mixed(index: &mut CodeIndex, value: &MixedValue) -> NodeResult<Option<Self>> {
        match value {
            MixedValue::Constant(constant) => Self::create(index, constant),
            MixedValue::Array(items) => {
                let array = ConstantArray::create(index)?;
                for item in items {
                    if let Some(element) = Self::create_from_mixed(index, item)? {
                        array.add_element(index, element)?;
                    }
                }
                Ok(Some(array.as_constant()))
            }
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn as_array(&self) -> Option<ConstantArray> {
        (self.tag == tags::CONSTANT_ARRAY).then_some(ConstantArray {
            address: self.address,
        })
    }

    /// Reads the value back. Arrays yield [`RuntimeConstant::NotAConstant`].
    pub fn get_constant(&self, index: &CodeIndex) -> NodeResult<RuntimeConstant> {
        let k = &index.schema().constants;
        let store = index.db().store();
        let a = self.address;
        Ok(match self.tag {
            tags::CONSTANT_BOOLEAN => RuntimeConstant::Boolean(k.boolean.value.get(store, a)?),
            tags::CONSTANT_BYTE => RuntimeConstant::Byte(k.byte.value.get(store, a)?),
            tags::CONSTANT_CHAR => RuntimeConstant::Char(k.char.value.get(store, a)?),
            tags::CONSTANT_DOUBLE => RuntimeConstant::Double(k.double.value.get(store, a)?),
            tags::CONSTANT_FLOAT => RuntimeConstant::Float(k.float.value.get(store, a)?),
            tags::CONSTANT_INT => RuntimeConstant::Int(k.int.value.get(store, a)?),
            tags::CONSTANT_LONG => RuntimeConstant::Long(k.long.value.get(store, a)?),
            tags::CONSTANT_SHORT => RuntimeConstant::Short(k.short.value.get(store, a)?),
            tags::CONSTANT_STRING => RuntimeConstant::String(k.string.value.get(store, a)?),
            tags::CONSTANT_ARRAY => RuntimeConstant::NotAConstant,
            other => {
                return Err(NodeError::corruption(
                    a,
                    format!("tag {:#06x} is not a constant", other),
                ))
            }
        })
    }

    /// Every parent slot that is currently set
    pub fn parents(&self, index: &CodeIndex) -> NodeResult<Vec<ParentSlot>> {
        let k = &index.schema().constants;
        let store = index.db().store();
        let a = self.address;
        let mut parents = Vec::new();
        if let Some(parent) = k.parent_array.get(store, a)? {
            parents.push(ParentSlot::ArrayElement(ConstantArray { address: parent }));
        }
        if let Some(parent) = k.parent_annotation_value.get(store, a)? {
            parents.push(ParentSlot::AnnotationValue(AnnotationValuePair::at(parent)));
        }
        if let Some(parent) = k.parent_variable.get(store, a)? {
            parents.push(ParentSlot::VariableValue(Variable::at(parent)));
        }
        if let Some(parent) = k.parent_method.get(store, a)? {
            parents.push(ParentSlot::MethodDefault(Method::at(parent)));
        }
        Ok(parents)
    }

    pub fn owner(&self, index: &CodeIndex) -> NodeResult<Option<ParentSlot>> {
        Ok(self.parents(index)?.into_iter().next())
    }

    pub(crate) fn clear_other_parents(&self, index: &mut CodeIndex, keep: Slot) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        let k = &schema.constants;
        if keep != Slot::Array {
            k.parent_array.put(db, self.address, None)?;
        }
        if keep != Slot::Annotation {
            k.parent_annotation_value.put(db, self.address, None)?;
        }
        if keep != Slot::Variable {
            k.parent_variable.put(db, self.address, None)?;
        }
        if keep != Slot::Method {
            k.parent_method.put(db, self.address, None)?;
        }
        Ok(())
    }

    /// Renders the value for diagnostics. Never fails.
    pub fn describe(&self, index: &CodeIndex) -> String {
        self.try_describe(index)
            .unwrap_or_else(|_| format!("<constant {}>", self.address))
    }

    fn try_describe(&self, index: &CodeIndex) -> NodeResult<String> {
        match self.as_array() {
            Some(array) => {
                let elements: Vec<String> = array
                    .elements(index)?
                    .iter()
                    .map(|e| e.describe(index))
                    .collect();
                Ok(format!("[{}]", elements.join(", ")))
            }
            None => Ok(self.get_constant(index)?.to_string()),
        }
    }
}

impl Node for Constant {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        self.tag
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Constant holding an ordered sequence of constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantArray {
    address: Address,
}

impl ConstantArray {
    pub fn create(index: &mut CodeIndex) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let address = db.allocate(&schema.constants.array)?;
        Ok(Self { address })
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().constants.array)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn as_constant(&self) -> Constant {
        Constant {
            address: self.address,
            tag: tags::CONSTANT_ARRAY,
        }
    }

    /// Appends `element`, detaching it from any other parent.
    pub fn add_element(&self, index: &mut CodeIndex, element: Constant) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema
            .constants
            .parent_array
            .put(db, element.address, Some(self.address))?;
        element.clear_other_parents(index, Slot::Array)
    }

    pub fn len(&self, index: &CodeIndex) -> NodeResult<usize> {
        let k = &index.schema().constants;
        Ok(k.array_elements.len(index.db().store(), self.address)?)
    }

    pub fn is_empty(&self, index: &CodeIndex) -> NodeResult<bool> {
        Ok(self.len(index)? == 0)
    }

    pub fn elements(&self, index: &CodeIndex) -> NodeResult<Vec<Constant>> {
        let k = &index.schema().constants;
        k.array_elements
            .to_vec(index.db().store(), self.address)?
            .into_iter()
            .map(|address| Constant::from_address(index, address))
            .collect()
    }
}

impl Node for ConstantArray {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::CONSTANT_ARRAY
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
