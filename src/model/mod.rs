//! Code index records
//!
//! The kinds a code-intelligence index keeps: resource files, workspace
//! locations, method and variable bindings, annotation values and
//! constants. [`CodeIndex`] declares them all and opens a store with them.
//!
//! Ownership tree:
//!
//! ```text
//! ResourceFile
//! ├── WorkspaceLocation*
//! └── Binding* (Method | Variable)
//!     ├── AnnotationValuePair* ── value: Constant
//!     ├── Method.default_value: Constant
//!     └── Variable.constant: Constant
//!                                ConstantArray ── elements: Constant*
//! ```

mod annotation;
mod binding;
mod constant;
mod fingerprint;
mod index;
mod parameter;
mod resource;
pub mod tags;

pub use annotation::AnnotationValuePair;
pub use binding::{BindingRecord, Method, Variable};
pub use constant::{Constant, ConstantArray, MixedValue, ParentSlot, RuntimeConstant};
pub use fingerprint::{FileFingerprint, FingerprintTest};
pub use index::{CodeIndex, IndexSchema, SchemaDump, TaggedLayout};
pub use parameter::{MethodParameter, FLG_COMPILER_DEFINED};
pub use resource::{FileBinding, ResourceFile, WorkspaceLocation};
