//! Node database context
//!
//! [`NodeDb`] pairs a backing store with the tag registry. It allocates
//! tagged records, hydrates them polymorphically and deletes them with
//! their owned dependents.
//!
//! Every node record starts with its tag, little-endian, in the first
//! [`NODE_HEADER_SIZE`](crate::schema::NODE_HEADER_SIZE) bytes.

use std::collections::HashSet;
use std::fmt::{self, Write};
use std::sync::Arc;

use crate::error::{NodeError, NodeResult};
use crate::observability::Logger;
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{Kind, KindId};
use crate::store::{Address, Store};

/// A store together with the kinds that give its bytes meaning.
pub struct NodeDb {
    store: Box<dyn Store>,
    types: Arc<NodeTypeRegistry>,
    /// Records whose deletion is in progress
    deleting: HashSet<Address>,
}

impl NodeDb {
    pub fn new(store: Box<dyn Store>, types: Arc<NodeTypeRegistry>) -> Self {
        Self {
            store,
            types,
            deleting: HashSet::new(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        self.store.as_mut()
    }

    pub fn types(&self) -> &NodeTypeRegistry {
        &self.types
    }

    pub fn into_store(self) -> Box<dyn Store> {
        self.store
    }

    /// Allocates a zeroed record of `kind` and writes its tag.
    pub fn allocate(&mut self, kind: &Kind) -> NodeResult<Address> {
        let tag = self
            .types
            .tag_for_kind(kind)
            .ok_or_else(|| NodeError::UnregisteredKind {
                kind: kind.name().to_string(),
            })?;
        let address = self.store.allocate(kind.size())?;
        self.store.put_u16(address, tag)?;
        Ok(address)
    }

    pub fn tag_at(&self, address: Address) -> NodeResult<Tag> {
        Ok(self.store.get_u16(address)?)
    }

    /// Kind of the record at `address`, from its tag header.
    pub fn kind_at(&self, address: Address) -> NodeResult<&Kind> {
        let tag = self.tag_at(address)?;
        self.types.require_kind(address, tag)
    }

    /// Fails unless the record at `address` is a `expected` or a subtype.
    pub fn check_kind(&self, address: Address, expected: &Kind) -> NodeResult<()> {
        self.check_kind_id(address, expected.id(), expected.name())
    }

    pub(crate) fn check_kind_id(
        &self,
        address: Address,
        expected: KindId,
        expected_name: &str,
    ) -> NodeResult<()> {
        let kind = self.kind_at(address)?;
        if kind.extends_id(expected) {
            Ok(())
        } else {
            Err(NodeError::KindMismatch {
                address,
                expected: expected_name.to_string(),
                actual: kind.name().to_string(),
            })
        }
    }

    /// Hydrates the record at `address` from its tag.
    pub fn load(&self, address: Address) -> NodeResult<Box<dyn Node>> {
        let tag = self.tag_at(address)?;
        self.types.create_node(address, tag)
    }

    /// Deletes the record, unlinking its relations and deleting every
    /// record it owns. Deleting null, or a record already being deleted,
    /// does nothing.
    pub fn delete(&mut self, address: Address) -> NodeResult<()> {
        if address.is_null() || !self.deleting.insert(address) {
            return Ok(());
        }
        let result = self.destruct(address);
        self.deleting.remove(&address);
        result
    }

    fn destruct(&mut self, address: Address) -> NodeResult<()> {
        let kind = self.kind_at(address)?.clone();
        for field in kind.fields() {
            if let Some(lifecycle) = field.lifecycle() {
                lifecycle.destruct(self, address)?;
            }
        }
        self.store.free(address)?;

        Logger::trace(
            "NODE_RECORD_DELETED",
            &[("address", &address.to_string()), ("kind", kind.name())],
        );
        Ok(())
    }

    /// Deletes the record if its kind can be owned and no owner is left.
    pub fn delete_if_unowned(&mut self, address: Address) -> NodeResult<()> {
        if address.is_null() || self.deleting.contains(&address) {
            return Ok(());
        }
        if !self.kind_at(address)?.has_owner_fields() || self.is_owned(address)? {
            return Ok(());
        }
        self.delete(address)
    }

    /// Whether any owning relation currently holds the record.
    pub fn is_owned(&self, address: Address) -> NodeResult<bool> {
        let kind = self.kind_at(address)?;
        for field in kind.fields() {
            if let Some(lifecycle) = field.lifecycle() {
                if lifecycle.has_owner(self.store(), address)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Renders the record for diagnostics. Never fails; unreadable records
    /// render as a placeholder.
    pub fn describe(&self, address: Address) -> String {
        self.try_describe(address)
            .unwrap_or_else(|_| format!("<record {}>", address))
    }

    fn try_describe(&self, address: Address) -> NodeResult<String> {
        let tag = self.tag_at(address)?;
        let kind = self
            .types
            .kind_for_tag(tag)
            .ok_or_else(|| NodeError::corruption(address, "unknown tag"))?;

        let store = self.store();
        let mut out = format!("{}{} {{", kind.name(), address);
        for (i, field) in kind.fields().into_iter().enumerate() {
            let slot = address.add(field.offset() as u64);
            let value = match field.type_name() {
                "bool" => (store.get_u8(slot)? != 0).to_string(),
                "byte" => store.get_i8(slot)?.to_string(),
                "short" => store.get_i16(slot)?.to_string(),
                "char" => {
                    let unit = store.get_u16(slot)?;
                    format!("{:?}", char::from_u32(unit as u32).unwrap_or('\u{fffd}'))
                }
                "int" => store.get_i32(slot)?.to_string(),
                "long" => store.get_i64(slot)?.to_string(),
                "float" => store.get_f32(slot)?.to_string(),
                "double" => store.get_f64(slot)?.to_string(),
                "string" => format!("{:?}", store.get_string(store.get_address(slot)?)?),
                _ => store.get_address(slot)?.to_string(),
            };
            let separator = if i == 0 { " " } else { ", " };
            // Writing to a String cannot fail.
            let _ = write!(out, "{}{}={}", separator, field.name(), value);
        }
        out.push_str(" }");
        Ok(out)
    }
}

impl fmt::Debug for NodeDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDb")
            .field("store", &self.store)
            .field("types", &self.types)
            .finish()
    }
}
