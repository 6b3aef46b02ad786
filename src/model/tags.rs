//! Tags of the built-in index kinds
//!
//! These values are persisted in every record header. Never renumber a tag;
//! retire it and add a new one.

use crate::registry::Tag;

pub const RESOURCE_FILE: Tag = 0x0001;
pub const WORKSPACE_LOCATION: Tag = 0x0002;
pub const METHOD: Tag = 0x0003;
pub const VARIABLE: Tag = 0x0004;
pub const ANNOTATION_VALUE_PAIR: Tag = 0x0005;

pub const CONSTANT_ARRAY: Tag = 0x0010;
pub const CONSTANT_BOOLEAN: Tag = 0x0011;
pub const CONSTANT_BYTE: Tag = 0x0012;
pub const CONSTANT_CHAR: Tag = 0x0013;
pub const CONSTANT_DOUBLE: Tag = 0x0014;
pub const CONSTANT_FLOAT: Tag = 0x0015;
pub const CONSTANT_INT: Tag = 0x0016;
pub const CONSTANT_LONG: Tag = 0x0017;
pub const CONSTANT_SHORT: Tag = 0x0018;
pub const CONSTANT_STRING: Tag = 0x0019;

/// Tags of kinds that were removed from the schema
pub const RETIRED: [Tag; 2] = [0x0006, 0x0007];
