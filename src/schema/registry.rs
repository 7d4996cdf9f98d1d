use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{DbSqlError, Result};
use crate::schema::{InboundSchema, OutboundSchema};
use crate::traits::Shape;
use crate::types::TypeRegistry;

type SchemaTable = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static GLOBAL: Lazy<Arc<ShapeRegistry>> = Lazy::new(|| Arc::new(ShapeRegistry::default()));

/// Process-lifetime cache of per-shape schemas.
///
/// Outbound (parameter) and inbound (column) schemas live in separate tables
/// because their exclusion rules differ. Entries are never evicted. Schemas are
/// built outside the lock; when two callers race on the same shape the first
/// insert wins and both get the stored entry.
pub struct ShapeRegistry {
    types: TypeRegistry,
    outbound: SchemaTable,
    inbound: SchemaTable,
}

impl ShapeRegistry {
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            types,
            outbound: RwLock::new(HashMap::new()),
            inbound: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry using the default type table.
    pub fn global() -> Arc<ShapeRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Returns the parameter-binding schema of `T`, building it on first use.
    ///
    /// Fails with `UnsupportedFieldType` when a bound field's type is missing
    /// from the type registry. Failed builds are not cached.
    pub fn outbound<T: Shape>(&self) -> Result<Arc<OutboundSchema<T>>> {
        let key = TypeId::of::<T>();
        if let Some(schema) = lookup::<OutboundSchema<T>>(&self.outbound, key)? {
            return Ok(schema);
        }
        let schema = OutboundSchema::<T>::build(&self.types)?;
        tracing::trace!(
            shape = std::any::type_name::<T>(),
            fields = schema.len(),
            "Built outbound schema"
        );
        insert(&self.outbound, key, Arc::new(schema))
    }

    /// Returns the row-mapping schema of `T`, building it on first use.
    pub fn inbound<T: Shape>(&self) -> Result<Arc<InboundSchema<T>>> {
        let key = TypeId::of::<T>();
        if let Some(schema) = lookup::<InboundSchema<T>>(&self.inbound, key)? {
            return Ok(schema);
        }
        let schema = InboundSchema::<T>::build();
        tracing::trace!(
            shape = std::any::type_name::<T>(),
            fields = schema.len(),
            "Built inbound schema"
        );
        insert(&self.inbound, key, Arc::new(schema))
    }

    pub fn has_outbound<T: 'static>(&self) -> bool {
        self.outbound.read().contains_key(&TypeId::of::<T>())
    }

    pub fn has_inbound<T: 'static>(&self) -> bool {
        self.inbound.read().contains_key(&TypeId::of::<T>())
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.read().len()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.read().len()
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new(TypeRegistry::default())
    }
}

fn lookup<S: Any + Send + Sync>(table: &SchemaTable, key: TypeId) -> Result<Option<Arc<S>>> {
    let entry = table.read().get(&key).cloned();
    entry.map(downcast::<S>).transpose()
}

// First insert wins; a racing builder's schema is dropped.
fn insert<S: Any + Send + Sync>(table: &SchemaTable, key: TypeId, schema: Arc<S>) -> Result<Arc<S>> {
    let entry = {
        let mut table = table.write();
        let entry = table
            .entry(key)
            .or_insert_with(|| schema as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
    };
    downcast::<S>(entry)
}

fn downcast<S: Any + Send + Sync>(entry: Arc<dyn Any + Send + Sync>) -> Result<Arc<S>> {
    entry.downcast::<S>().map_err(|_| {
        DbSqlError::InvalidArgument(format!(
            "cached schema is not a {}",
            std::any::type_name::<S>()
        ))
    })
}
