//! Client Module
//!
//! Blocking, buffer-oriented access to streams held by a River store.
//!
//! ## Layers
//! - [`Connection`]: one TCP session, shared by clones
//! - [`StreamResolver`]: waits for a named stream and binds a cursor
//! - [`StreamReader`] / [`StreamWriter`]: record-batch I/O through caller
//!   buffers, with scoped shutdown via [`ReaderScope`] / [`WriterScope`]
//! - [`BatchWriter`]: background batching on top of a writer
//!
//! A connection carries one request at a time. Readers and writers sharing
//! a connection take turns; their cursors stay independent.

mod admin;
mod batch;
mod connection;
mod reader;
mod resolver;
mod writer;

pub use batch::BatchWriter;
pub use connection::{Connection, ConnectionState};
pub use reader::{ReadResult, ReaderScope, StreamReader};
pub use resolver::{StreamHandle, StreamResolver};
pub use writer::{StreamWriter, WriterScope};
