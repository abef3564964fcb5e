//! The document-store boundary.
//!
//! The loader only needs three capabilities from a store: naming a
//! collection, running a find or an aggregation, and pulling documents
//! off the resulting cursor one at a time.

pub mod memory;
pub mod mongo;

use bson::Document;

pub use memory::MemoryStore;
pub use mongo::MongoConnection;

use crate::error::StoreError;

/// A shared, read-only handle to a store.
pub trait Connection: Send + Sync {
    fn collection(&self, database: &str, name: &str) -> Box<dyn Collection>;
}

/// One collection of one database.
pub trait Collection {
    /// `database.collection`.
    fn namespace(&self) -> String;

    /// # Errors
    /// Returns a `StoreError` if the server rejects the query.
    fn find(&self, options: FindOptions) -> Result<Box<dyn DocumentCursor>, StoreError>;

    /// # Errors
    /// Returns a `StoreError` if the server rejects the pipeline.
    fn aggregate(
        &self,
        pipeline: &[Document],
        batch_size: u32,
    ) -> Result<Box<dyn DocumentCursor>, StoreError>;
}

/// Pull handle over query results.
pub trait DocumentCursor: Send {
    /// The next document, or `None` once the results end or an error occurred.
    fn next_document(&mut self) -> Option<Document>;

    /// The error that stopped the cursor, if any.
    fn last_error(&self) -> Option<&StoreError>;
}

/// Arguments of a find, as forwarded to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    /// Documents per server round trip.
    pub batch_size: u32,
}
