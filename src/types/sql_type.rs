use std::any::TypeId;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

/// SQL parameter type tag attached to every bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Binary,
    Guid,
    DateTime,
}

/// Lookup table from Rust value types to SQL parameter types.
///
/// A field whose value type is missing here cannot be bound as a parameter.
/// `Option<T>` is a separate type and must be registered on its own;
/// the default table registers both forms for every primitive.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<TypeId, SqlType>,
}

macro_rules! register_defaults {
    ($registry:ident, $($ty:ty => $sql:expr),* $(,)?) => {
        $(
            $registry.register::<$ty>($sql);
            $registry.register::<Option<$ty>>($sql);
        )*
    };
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in primitive mappings.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        register_defaults!(registry,
            bool => SqlType::Boolean,
            i16 => SqlType::Int16,
            i32 => SqlType::Int32,
            i64 => SqlType::Int64,
            f32 => SqlType::Float32,
            f64 => SqlType::Float64,
            String => SqlType::String,
            Vec<u8> => SqlType::Binary,
            Uuid => SqlType::Guid,
            NaiveDateTime => SqlType::DateTime,
        );
        registry
    }

    /// Registers (or replaces) the SQL type for `T`.
    pub fn register<T: 'static>(&mut self, sql_type: SqlType) {
        self.types.insert(TypeId::of::<T>(), sql_type);
    }

    pub fn with<T: 'static>(mut self, sql_type: SqlType) -> Self {
        self.register::<T>(sql_type);
        self
    }

    pub fn get<T: 'static>(&self) -> Option<SqlType> {
        self.lookup(TypeId::of::<T>())
    }

    pub fn lookup(&self, type_id: TypeId) -> Option<SqlType> {
        self.types.get(&type_id).copied()
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.types.contains_key(&type_id)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
