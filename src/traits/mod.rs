mod driver;
mod shape;

pub use driver::{DataReader, DbConnection, ProviderFactory};
pub use shape::{FieldDescriptor, Shape};

pub(crate) use shape::{Getter, Setter};
