/// Object storage abstraction for question images.
pub mod media_store;
/// Database model definitions.
pub mod models;
/// Session/answer/event store backends.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
