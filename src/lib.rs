//! dbsql - A micro object mapper over a driver-agnostic SQL connection layer
//!
//! Plain data types describe their fields once through [`Shape`]; the
//! description is cached per type, then used to bind parameter objects and to
//! map result rows. Every [`Query`] owns one connection and runs exactly one
//! statement.
//!
//! # Example
//! ```ignore
//! use dbsql::{DbController, FieldDescriptor, Shape};
//!
//! #[derive(Default)]
//! struct User {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Shape for User {
//!     fn fields() -> Vec<FieldDescriptor<Self>> {
//!         vec![
//!             FieldDescriptor::new("name", |u: &User| &u.name, |u: &mut User| &mut u.name),
//!             FieldDescriptor::new("age", |u: &User| &u.age, |u: &mut User| &mut u.age),
//!         ]
//!     }
//! }
//!
//! struct MinAge {
//!     age: i32,
//! }
//!
//! impl Shape for MinAge {
//!     fn fields() -> Vec<FieldDescriptor<Self>> {
//!         vec![FieldDescriptor::read_only("age", |p: &MinAge| &p.age)]
//!     }
//! }
//!
//! let controller = DbController::postgres("host=localhost user=postgres dbname=app");
//!
//! let users: Vec<User> = controller
//!     .query_with("SELECT * FROM users WHERE age > @age", MinAge { age: 18 })?
//!     .read_many()?;
//!
//! let count = controller
//!     .query_text("SELECT COUNT(*) FROM users")?
//!     .read_first::<i64>()?;
//! ```

pub mod binder;
pub mod config;
pub mod controllers;
pub mod drivers;
pub mod error;
pub mod mapper;
pub mod query;
pub mod schema;
pub mod traits;
pub mod types;

mod controller;

// Re-export main types for convenient access
pub use binder::{ParameterBinder, ParameterSource};
pub use config::{ConnectionSettings, ConnectionStrings};
pub use controller::DbController;
pub use controllers::DbControllers;
pub use error::{DbSqlError, Result};
pub use mapper::{CurrentRow, FromRow, RowMapper};
pub use query::Query;
pub use schema::{InboundSchema, OutboundSchema, ShapeRegistry};
pub use traits::{DataReader, DbConnection, FieldDescriptor, ProviderFactory, Shape};
pub use types::{
    BufferedReader, DbCommand, DbParameter, FromSqlValue, ResultColumns, ResultSet, SqlType,
    SqlValue, TypeRegistry,
};
