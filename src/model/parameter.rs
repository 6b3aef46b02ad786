//! Method parameters
//!
//! Parameters are embedded in their method's parameter list rather than
//! being tagged nodes, so they are addressed only through the method.

use super::index::CodeIndex;
use crate::error::NodeResult;
use crate::schema::{ByteField, Kind, KindBuilder, StringField};
use crate::store::Address;

/// Parameter was added by the compiler and has no source counterpart.
pub const FLG_COMPILER_DEFINED: i8 = 0x01;

pub(crate) struct ParameterKinds {
    pub(crate) kind: Kind,
    pub(crate) type_descriptor: StringField,
    pub(crate) name: StringField,
    pub(crate) flags: ByteField,
}

impl ParameterKinds {
    pub(crate) fn declare() -> Self {
        let mut builder = KindBuilder::structure("MethodParameter");
        let type_descriptor = builder.add_string("type_descriptor");
        let name = builder.add_string("name");
        let flags = builder.add_byte("flags");
        Self {
            kind: builder.finish(),
            type_descriptor,
            name,
            flags,
        }
    }
}

/// One element of a method's parameter list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    address: Address,
}

impl MethodParameter {
    pub(crate) fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn type_descriptor(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().parameter;
        Ok(k.type_descriptor.get(index.db().store(), self.address)?)
    }

    pub fn set_type_descriptor(&self, index: &mut CodeIndex, descriptor: &str) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema
            .parameter
            .type_descriptor
            .put(db.store_mut(), self.address, descriptor)?)
    }

    pub fn name(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().parameter;
        Ok(k.name.get(index.db().store(), self.address)?)
    }

    pub fn set_name(&self, index: &mut CodeIndex, name: &str) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema.parameter.name.put(db.store_mut(), self.address, name)?)
    }

    pub fn flags(&self, index: &CodeIndex) -> NodeResult<i8> {
        let k = &index.schema().parameter;
        Ok(k.flags.get(index.db().store(), self.address)?)
    }

    pub fn set_flags(&self, index: &mut CodeIndex, flags: i8) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        Ok(schema.parameter.flags.put(db.store_mut(), self.address, flags)?)
    }

    pub fn is_compiler_defined(&self, index: &CodeIndex) -> NodeResult<bool> {
        Ok(self.flags(index)? & FLG_COMPILER_DEFINED != 0)
    }
}
