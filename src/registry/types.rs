//! Tag to factory registry

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use super::node::{Node, RecordNode};
use super::Tag;
use crate::error::{NodeError, NodeResult};
use crate::observability::Logger;
use crate::schema::{Kind, KindId, SchemaError, SchemaResult};
use crate::store::Address;

/// Builds the typed wrapper for a record at an address
pub type NodeFactory = Arc<dyn Fn(Address) -> Box<dyn Node> + Send + Sync>;

struct Registration {
    kind: Kind,
    factory: NodeFactory,
}

/// Maps tags to node kinds and back.
///
/// Built during startup and then shared read-only.
#[derive(Default)]
pub struct NodeTypeRegistry {
    by_tag: HashMap<Tag, Registration>,
    by_kind: HashMap<KindId, Tag>,
    reserved: BTreeSet<Tag>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `tag` to `kind` and its factory.
    pub fn register<F>(&mut self, tag: Tag, kind: &Kind, factory: F) -> SchemaResult<()>
    where
        F: Fn(Address) -> Box<dyn Node> + Send + Sync + 'static,
    {
        if self.reserved.contains(&tag) {
            return Err(SchemaError::reserved_tag(tag as u32));
        }
        if let Some(existing) = self.by_tag.get(&tag) {
            return Err(SchemaError::duplicate_tag(tag as u32, existing.kind.name()));
        }
        if kind.is_abstract() {
            return Err(SchemaError::not_instantiable(kind.name(), "kind is abstract"));
        }
        if !kind.is_node() {
            return Err(SchemaError::not_instantiable(kind.name(), "struct kinds have no tag"));
        }
        if let Some(&existing) = self.by_kind.get(&kind.id()) {
            return Err(SchemaError::kind_already_registered(kind.name(), existing as u32));
        }

        self.by_tag.insert(
            tag,
            Registration {
                kind: kind.clone(),
                factory: Arc::new(factory),
            },
        );
        self.by_kind.insert(kind.id(), tag);

        Logger::trace(
            "NODE_KIND_REGISTERED",
            &[("kind", kind.name()), ("tag", &format!("{:#06x}", tag))],
        );
        Ok(())
    }

    /// Like [`register`](Self::register) for tags that arrive as wider
    /// integers, such as configuration values.
    pub fn register_raw<F>(&mut self, tag: u32, kind: &Kind, factory: F) -> SchemaResult<()>
    where
        F: Fn(Address) -> Box<dyn Node> + Send + Sync + 'static,
    {
        let tag = Tag::try_from(tag).map_err(|_| SchemaError::tag_out_of_range(tag))?;
        self.register(tag, kind, factory)
    }

    /// Registers `kind` with the generic [`RecordNode`] wrapper.
    pub fn register_record(&mut self, tag: Tag, kind: &Kind) -> SchemaResult<()> {
        self.register(tag, kind, move |address| {
            Box::new(RecordNode::new(address, tag))
        })
    }

    /// Blocks `tag` from ever being registered.
    pub fn reserve(&mut self, tag: Tag) -> SchemaResult<()> {
        if let Some(existing) = self.by_tag.get(&tag) {
            return Err(SchemaError::duplicate_tag(tag as u32, existing.kind.name()));
        }
        if self.reserved.insert(tag) {
            Logger::trace("NODE_TAG_RESERVED", &[("tag", &format!("{:#06x}", tag))]);
        }
        Ok(())
    }

    pub fn reserve_raw(&mut self, tag: u32) -> SchemaResult<()> {
        let tag = Tag::try_from(tag).map_err(|_| SchemaError::tag_out_of_range(tag))?;
        self.reserve(tag)
    }

    /// Hydrates the record at `address` using the factory for `tag`.
    pub fn create_node(&self, address: Address, tag: Tag) -> NodeResult<Box<dyn Node>> {
        match self.by_tag.get(&tag) {
            Some(registration) => Ok((registration.factory)(address)),
            None => Err(unknown_tag(address, tag)),
        }
    }

    /// Kind for a tag read from the record at `address`.
    pub fn require_kind(&self, address: Address, tag: Tag) -> NodeResult<&Kind> {
        self.kind_for_tag(tag)
            .ok_or_else(|| unknown_tag(address, tag))
    }

    pub fn kind_for_tag(&self, tag: Tag) -> Option<&Kind> {
        self.by_tag.get(&tag).map(|r| &r.kind)
    }

    pub fn tag_for_kind(&self, kind: &Kind) -> Option<Tag> {
        self.tag_for_kind_id(kind.id())
    }

    pub fn tag_for_kind_id(&self, id: KindId) -> Option<Tag> {
        self.by_kind.get(&id).copied()
    }

    pub fn is_registered_kind(&self, kind: &Kind) -> bool {
        self.by_kind.contains_key(&kind.id())
    }

    pub fn is_reserved(&self, tag: Tag) -> bool {
        self.reserved.contains(&tag)
    }

    /// Registered tags and kinds in tag order
    pub fn registered(&self) -> Vec<(Tag, &Kind)> {
        let mut entries: Vec<_> = self
            .by_tag
            .iter()
            .map(|(&tag, registration)| (tag, &registration.kind))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        entries
    }

    pub fn reserved_tags(&self) -> Vec<Tag> {
        self.reserved.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

fn unknown_tag(address: Address, tag: Tag) -> NodeError {
    Logger::error(
        "NODE_INDEX_CORRUPTION",
        &[
            ("address", &address.to_string()),
            ("tag", &format!("{:#06x}", tag)),
        ],
    );
    NodeError::UnknownTag { tag, address }
}

impl fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeRegistry")
            .field("registered", &self.by_tag.len())
            .field("reserved", &self.reserved)
            .finish()
    }
}
