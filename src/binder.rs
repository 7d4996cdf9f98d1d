use std::sync::Arc;

use crate::error::Result;
use crate::schema::ShapeRegistry;
use crate::traits::{ProviderFactory, Shape};
use crate::types::DbParameter;

/// Turns a plain data object into driver parameters using its cached
/// outbound schema.
#[derive(Clone)]
pub struct ParameterBinder {
    registry: Arc<ShapeRegistry>,
    provider: Arc<dyn ProviderFactory>,
}

impl ParameterBinder {
    pub fn new(registry: Arc<ShapeRegistry>, provider: Arc<dyn ProviderFactory>) -> Self {
        Self { registry, provider }
    }

    /// Builds one parameter per bound field, in field declaration order.
    /// The source object is only read.
    pub fn build<T: Shape>(&self, source: &T) -> Result<Vec<DbParameter>> {
        let schema = self.registry.outbound::<T>()?;
        let parameters = schema
            .bindings()
            .iter()
            .map(|binding| {
                self.provider
                    .create_parameter(binding.name(), binding.sql_type(), binding.value(source))
            })
            .collect();
        Ok(parameters)
    }
}

/// A parameter object whose concrete shape has been erased.
/// Implemented for every [`Shape`].
pub trait ParameterSource: Send + Sync {
    fn bind(&self, binder: &ParameterBinder) -> Result<Vec<DbParameter>>;
}

impl<T: Shape> ParameterSource for T {
    fn bind(&self, binder: &ParameterBinder) -> Result<Vec<DbParameter>> {
        binder.build(self)
    }
}
