//! Resource files and their workspace locations
//!
//! A resource file is the root of everything indexed from one file. Deleting
//! it deletes its locations and bindings, and through them every annotation
//! value and constant they own.

use std::any::Any;

use super::binding::{BindingKinds, Method, Variable};
use super::fingerprint::FileFingerprint;
use super::index::CodeIndex;
use super::tags;
use crate::error::NodeResult;
use crate::registry::{Node, NodeTypeRegistry, Tag};
use crate::schema::{Kind, KindBuilder, LongField, ManyToOne, OneToMany, Ownership, SchemaResult, StringField};
use crate::store::Address;

pub(crate) struct ResourceKinds {
    pub(crate) location: Kind,
    pub(crate) location_resource: ManyToOne,
    pub(crate) location_path: StringField,

    pub(crate) file: Kind,
    pub(crate) filename: StringField,
    pub(crate) fingerprint_time: LongField,
    pub(crate) fingerprint_size: LongField,
    pub(crate) fingerprint_hash: LongField,
    pub(crate) time_last_used: LongField,
    pub(crate) workspace_locations: OneToMany,
    pub(crate) bindings: OneToMany,
}

impl ResourceKinds {
    pub(crate) fn declare(types: &mut NodeTypeRegistry, binding: &BindingKinds) -> SchemaResult<Self> {
        let mut builder = KindBuilder::node("WorkspaceLocation");
        let location_resource = builder.add_many_to_one("resource", Ownership::OwnedByReferent);
        let location_path = builder.add_string("path");
        let location = builder.finish();
        types.register(tags::WORKSPACE_LOCATION, &location, |address| {
            Box::new(WorkspaceLocation { address })
        })?;

        let mut builder = KindBuilder::node("ResourceFile");
        let filename = builder.add_string("filename");
        let fingerprint_time = builder.add_long("fingerprint_time");
        let fingerprint_size = builder.add_long("fingerprint_size");
        let fingerprint_hash = builder.add_long("fingerprint_hash");
        let time_last_used = builder.add_long("time_last_used");
        let workspace_locations = builder.add_one_to_many("workspace_locations", &location_resource)?;
        let bindings = builder.add_one_to_many("bindings", &binding.file)?;
        let file = builder.finish();
        types.register(tags::RESOURCE_FILE, &file, |address| {
            Box::new(ResourceFile { address })
        })?;

        Ok(Self {
            location,
            location_resource,
            location_path,
            file,
            filename,
            fingerprint_time,
            fingerprint_size,
            fingerprint_hash,
            time_last_used,
            workspace_locations,
            bindings,
        })
    }
}

/// A binding of a resource file, resolved to its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileBinding {
    Method(Method),
    Variable(Variable),
}

/// One indexed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFile {
    address: Address,
}

impl ResourceFile {
    pub(crate) fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn create(index: &mut CodeIndex, filename: &str) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let k = &schema.resource;
        let address = db.allocate(&k.file)?;
        k.filename.put(db.store_mut(), address, filename)?;
        let file = Self { address };
        file.mark_used(index)?;
        Ok(file)
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().resource.file)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn filename(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().resource;
        Ok(k.filename.get(index.db().store(), self.address)?)
    }

    pub fn fingerprint(&self, index: &CodeIndex) -> NodeResult<FileFingerprint> {
        let k = &index.schema().resource;
        let store = index.db().store();
        Ok(FileFingerprint::new(
            k.fingerprint_time.get(store, self.address)?,
            k.fingerprint_size.get(store, self.address)?,
            k.fingerprint_hash.get(store, self.address)? as u64,
        ))
    }

    pub fn set_fingerprint(&self, index: &mut CodeIndex, fingerprint: &FileFingerprint) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        let k = &schema.resource;
        let store = db.store_mut();
        k.fingerprint_time.put(store, self.address, fingerprint.time())?;
        k.fingerprint_size.put(store, self.address, fingerprint.size())?;
        k.fingerprint_hash
            .put(store, self.address, fingerprint.hash() as i64)?;
        Ok(())
    }

    /// Milliseconds since the epoch when the file was last used
    pub fn time_last_used(&self, index: &CodeIndex) -> NodeResult<i64> {
        let k = &index.schema().resource;
        Ok(k.time_last_used.get(index.db().store(), self.address)?)
    }

    pub fn mark_used(&self, index: &mut CodeIndex) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        let now = chrono::Utc::now().timestamp_millis();
        Ok(schema
            .resource
            .time_last_used
            .put(db.store_mut(), self.address, now)?)
    }

    pub fn workspace_locations(&self, index: &CodeIndex) -> NodeResult<Vec<WorkspaceLocation>> {
        let k = &index.schema().resource;
        Ok(k.workspace_locations
            .to_vec(index.db().store(), self.address)?
            .into_iter()
            .map(|address| WorkspaceLocation { address })
            .collect())
    }

    /// Bindings read from this file, hydrated from their tags
    pub fn bindings(&self, index: &CodeIndex) -> NodeResult<Vec<FileBinding>> {
        let k = &index.schema().resource;
        let mut bindings = Vec::new();
        for address in k.bindings.to_vec(index.db().store(), self.address)? {
            let node = index.db().load(address)?;
            if let Some(method) = node.downcast_ref::<Method>() {
                bindings.push(FileBinding::Method(*method));
            } else if let Some(variable) = node.downcast_ref::<Variable>() {
                bindings.push(FileBinding::Variable(*variable));
            }
        }
        Ok(bindings)
    }

    pub fn delete(self, index: &mut CodeIndex) -> NodeResult<()> {
        index.delete(self.address)
    }
}

impl Node for ResourceFile {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::RESOURCE_FILE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A workspace path at which a resource file is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceLocation {
    address: Address,
}

impl WorkspaceLocation {
    pub fn create(index: &mut CodeIndex, file: &ResourceFile, path: &str) -> NodeResult<Self> {
        let (schema, db) = index.parts_mut();
        let k = &schema.resource;
        let address = db.allocate(&k.location)?;
        k.location_path.put(db.store_mut(), address, path)?;
        k.location_resource.put(db, address, Some(file.address()))?;
        Ok(Self { address })
    }

    pub fn from_address(index: &CodeIndex, address: Address) -> NodeResult<Self> {
        index
            .db()
            .check_kind(address, &index.schema().resource.location)?;
        Ok(Self { address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn path(&self, index: &CodeIndex) -> NodeResult<String> {
        let k = &index.schema().resource;
        Ok(k.location_path.get(index.db().store(), self.address)?)
    }

    pub fn resource(&self, index: &CodeIndex) -> NodeResult<Option<ResourceFile>> {
        let k = &index.schema().resource;
        Ok(k.location_resource
            .get(index.db().store(), self.address)?
            .map(ResourceFile::at))
    }

    /// Detaches the location from its file, which deletes it.
    pub fn detach(self, index: &mut CodeIndex) -> NodeResult<()> {
        let (schema, db) = index.parts_mut();
        schema.resource.location_resource.put(db, self.address, None)
    }
}

impl Node for WorkspaceLocation {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        tags::WORKSPACE_LOCATION
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
