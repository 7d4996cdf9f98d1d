mod command;
mod row;
mod sql_type;
mod sql_value;

pub use command::{DbCommand, DbParameter};
pub use row::{BufferedReader, ResultColumns, ResultSet};
pub use sql_type::{SqlType, TypeRegistry};
pub use sql_value::{FromSqlValue, SqlValue};
