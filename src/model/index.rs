//! The code index schema and its database handle

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::annotation::AnnotationKinds;
use super::binding::BindingKinds;
use super::constant::ConstantKinds;
use super::parameter::ParameterKinds;
use super::resource::ResourceKinds;
use super::tags;
use crate::config::NodeDbConfig;
use crate::db::NodeDb;
use crate::error::{NodeError, NodeResult};
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{KindLayout, SchemaResult};
use crate::store::{save_image, Address, MemoryStore, Store};

/// Every kind and field accessor of the code index.
pub struct IndexSchema {
    pub(crate) constants: ConstantKinds,
    pub(crate) parameter: ParameterKinds,
    pub(crate) annotation: AnnotationKinds,
    pub(crate) binding: BindingKinds,
    pub(crate) resource: ResourceKinds,
}

impl IndexSchema {
    /// Declares all kinds and registers their tags with `types`.
    ///
    /// Declaration order matters: a relation's inverse can only be declared
    /// after the relation itself.
    pub fn build(types: &mut NodeTypeRegistry) -> SchemaResult<Self> {
        for tag in tags::RETIRED {
            types.reserve(tag)?;
        }
        let constants = ConstantKinds::declare(types)?;
        let parameter = ParameterKinds::declare();
        let annotation = AnnotationKinds::declare(types, &constants)?;
        let binding = BindingKinds::declare(types, &constants, &parameter, &annotation)?;
        let resource = ResourceKinds::declare(types, &binding)?;
        Ok(Self {
            constants,
            parameter,
            annotation,
            binding,
            resource,
        })
    }

    /// Layouts of the abstract and struct kinds, which have no tag
    pub fn untagged_layouts(&self) -> Vec<KindLayout> {
        vec![
            self.constants.constant.layout(),
            self.binding.binding.layout(),
            self.parameter.kind.layout(),
        ]
    }
}

/// Dump of a registry and schema, for inspection tools
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDump {
    pub kinds: Vec<TaggedLayout>,
    pub fragments: Vec<KindLayout>,
    pub reserved_tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaggedLayout {
    pub tag: Tag,
    #[serde(flatten)]
    pub layout: KindLayout,
}

/// A node database holding a code index.
pub struct CodeIndex {
    db: NodeDb,
    schema: Arc<IndexSchema>,
}

impl CodeIndex {
    /// Opens an index over `store`, reserving the configured tags before
    /// the built-in kinds are registered.
    pub fn open(store: Box<dyn Store>, config: &NodeDbConfig) -> NodeResult<Self> {
        let mut types = NodeTypeRegistry::new();
        for &tag in &config.reserved_tags {
            types.reserve_raw(tag)?;
        }
        let schema = IndexSchema::build(&mut types)?;
        Ok(Self {
            db: NodeDb::new(store, Arc::new(types)),
            schema: Arc::new(schema),
        })
    }

    /// Opens the store described by `config`.
    pub fn from_config(config: &NodeDbConfig) -> NodeResult<Self> {
        Self::open(config.open_store()?, config)
    }

    /// Fresh in-memory index with default settings
    pub fn in_memory() -> NodeResult<Self> {
        Self::open(Box::new(MemoryStore::new()), &NodeDbConfig::default())
    }

    pub fn db(&self) -> &NodeDb {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut NodeDb {
        &mut self.db
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub(crate) fn parts_mut(&mut self) -> (&IndexSchema, &mut NodeDb) {
        (&self.schema, &mut self.db)
    }

    pub fn types(&self) -> &NodeTypeRegistry {
        self.db.types()
    }

    /// Hydrates any record from its tag.
    pub fn load(&self, address: Address) -> NodeResult<Box<dyn Node>> {
        self.db.load(address)
    }

    pub fn delete(&mut self, address: Address) -> NodeResult<()> {
        self.db.delete(address)
    }

    pub fn describe(&self, address: Address) -> String {
        self.db.describe(address)
    }

    pub fn dump_schema(&self) -> SchemaDump {
        SchemaDump {
            kinds: self
                .types()
                .registered()
                .into_iter()
                .map(|(tag, kind)| TaggedLayout {
                    tag,
                    layout: kind.layout(),
                })
                .collect(),
            fragments: self.schema.untagged_layouts(),
            reserved_tags: self.types().reserved_tags(),
        }
    }

    /// Writes the store to an image file.
    pub fn save(&self, path: &Path) -> NodeResult<()> {
        let memory = self
            .db
            .store()
            .as_any()
            .downcast_ref::<MemoryStore>()
            .ok_or_else(|| NodeError::Config("store does not support image files".into()))?;
        Ok(save_image(memory, path)?)
    }
}

impl std::fmt::Debug for CodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndex").field("db", &self.db).finish()
    }
}
