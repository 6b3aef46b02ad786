//! Schema and registry error types
//!
//! Every schema error is a programming error in a kind declaration or tag
//! registration. They surface while the process declares its kinds, so
//! startup fails before any record is touched.
//!
//! Error codes:
//! - ND_REGISTRY_DUPLICATE_TAG
//! - ND_REGISTRY_RESERVED_TAG
//! - ND_REGISTRY_TAG_OUT_OF_RANGE
//! - ND_REGISTRY_NOT_INSTANTIABLE
//! - ND_REGISTRY_KIND_ALREADY_REGISTERED
//! - ND_SCHEMA_INVALID_LIST_ELEMENT
//! - ND_SCHEMA_INVERSE_ALREADY_BOUND
//! - ND_SCHEMA_UNBOUND_RELATION

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The process must not continue with this schema
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Tag already bound to a kind
    NdRegistryDuplicateTag,
    /// Tag permanently reserved for a retired kind
    NdRegistryReservedTag,
    /// Tag does not fit in 16 bits
    NdRegistryTagOutOfRange,
    /// Abstract kinds and struct kinds cannot be tagged
    NdRegistryNotInstantiable,
    /// Kind already bound to another tag
    NdRegistryKindAlreadyRegistered,
    /// List element kind must be a concrete struct kind
    NdSchemaInvalidListElement,
    /// Relation inverse declared twice
    NdSchemaInverseAlreadyBound,
    /// Relation used before its inverse was declared
    NdSchemaUnboundRelation,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::NdRegistryDuplicateTag => "ND_REGISTRY_DUPLICATE_TAG",
            SchemaErrorCode::NdRegistryReservedTag => "ND_REGISTRY_RESERVED_TAG",
            SchemaErrorCode::NdRegistryTagOutOfRange => "ND_REGISTRY_TAG_OUT_OF_RANGE",
            SchemaErrorCode::NdRegistryNotInstantiable => "ND_REGISTRY_NOT_INSTANTIABLE",
            SchemaErrorCode::NdRegistryKindAlreadyRegistered => {
                "ND_REGISTRY_KIND_ALREADY_REGISTERED"
            }
            SchemaErrorCode::NdSchemaInvalidListElement => "ND_SCHEMA_INVALID_LIST_ELEMENT",
            SchemaErrorCode::NdSchemaInverseAlreadyBound => "ND_SCHEMA_INVERSE_ALREADY_BOUND",
            SchemaErrorCode::NdSchemaUnboundRelation => "ND_SCHEMA_UNBOUND_RELATION",
        }
    }

    /// Returns the severity level (always FATAL)
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    /// Tag involved, if any
    tag: Option<u32>,
    /// Kind involved, if any
    kind: Option<String>,
}

impl SchemaError {
    /// Tag already in use
    pub fn duplicate_tag(tag: u32, existing: &str) -> Self {
        Self {
            code: SchemaErrorCode::NdRegistryDuplicateTag,
            message: format!("tag {:#06x} is already registered to {}", tag, existing),
            tag: Some(tag),
            kind: Some(existing.to_string()),
        }
    }

    /// Tag reserved for a retired kind
    pub fn reserved_tag(tag: u32) -> Self {
        Self {
            code: SchemaErrorCode::NdRegistryReservedTag,
            message: format!("tag {:#06x} is reserved", tag),
            tag: Some(tag),
            kind: None,
        }
    }

    /// Tag wider than 16 bits
    pub fn tag_out_of_range(tag: u32) -> Self {
        Self {
            code: SchemaErrorCode::NdRegistryTagOutOfRange,
            message: format!("tag {:#x} does not fit in 16 bits", tag),
            tag: Some(tag),
            kind: None,
        }
    }

    /// Abstract or struct kind passed to registration
    pub fn not_instantiable(kind: &str, reason: &str) -> Self {
        Self {
            code: SchemaErrorCode::NdRegistryNotInstantiable,
            message: format!("kind {} cannot be tagged: {}", kind, reason),
            tag: None,
            kind: Some(kind.to_string()),
        }
    }

    /// Kind registered under a second tag
    pub fn kind_already_registered(kind: &str, tag: u32) -> Self {
        Self {
            code: SchemaErrorCode::NdRegistryKindAlreadyRegistered,
            message: format!("kind {} is already registered under tag {:#06x}", kind, tag),
            tag: Some(tag),
            kind: Some(kind.to_string()),
        }
    }

    /// List declared over a kind that cannot be embedded
    pub fn invalid_list_element(kind: &str) -> Self {
        Self {
            code: SchemaErrorCode::NdSchemaInvalidListElement,
            message: format!("kind {} is not a concrete struct kind", kind),
            tag: None,
            kind: Some(kind.to_string()),
        }
    }

    /// Second inverse declared for one relation
    pub fn inverse_already_bound(field: &str) -> Self {
        Self {
            code: SchemaErrorCode::NdSchemaInverseAlreadyBound,
            message: format!("relation {} already has an inverse", field),
            tag: None,
            kind: None,
        }
    }

    /// Relation used before its inverse exists
    pub fn unbound_relation(field: &str) -> Self {
        Self {
            code: SchemaErrorCode::NdSchemaUnboundRelation,
            message: format!("relation {} has no inverse declared", field),
            tag: None,
            kind: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the tag involved, if any
    pub fn tag(&self) -> Option<u32> {
        self.tag
    }

    /// Returns the kind involved, if any
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
