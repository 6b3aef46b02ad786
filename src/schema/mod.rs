//! Record schema for nodedb
//!
//! Kinds describe the binary layout of records; field accessors read and
//! write one slot of that layout through a [`Store`](crate::store::Store).
//!
//! # Design Principles
//!
//! - Layouts are declared once at startup and never change afterwards
//! - A child kind appends its fields after its parent's, without padding
//! - Relations always update both of their sides
//! - Abstract kinds are layout fragments and are never instantiated

mod errors;
mod field;
mod kind;
mod list;
mod relation;

pub use errors::{Severity, SchemaError, SchemaErrorCode, SchemaResult};
pub use field::{
    BoolField, ByteField, CharField, DoubleField, FieldLifecycle, FloatField, IntField, LongField,
    Scalar, ScalarField, ShortField, StringField,
};
pub use kind::{
    FieldEntry, FieldLayout, Kind, KindBuilder, KindFamily, KindId, KindLayout, NODE_HEADER_SIZE,
};
pub use list::ListField;
pub use relation::{ManyToOne, OneToMany, OneToOne, Ownership};
