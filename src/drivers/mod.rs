mod in_memory_test;
mod placeholders;
mod postgres;

pub use self::in_memory_test::{
    InMemoryTestConnection, InMemoryTestProvider, InMemoryTestResponseBuilder, RecordedCommand,
    TestResponse,
};
pub use self::postgres::{PostgresConnection, PostgresProvider};
