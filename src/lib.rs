//! Streams MongoDB query results into typed tensor batches.
//!
//! A [`Dataset`] runs a [`QueryPlan`] against a collection, decodes each
//! document into a [`Record`] and folds every page of records into a
//! [`Batch`] laid out by a [`Schema`].

pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod iris;
pub mod query;
pub mod record;
pub mod store;
pub mod tensor;

pub use batch::{accumulate, accumulate_maps, Batch, Schema, Slot, SlotMap};
pub use config::DatasetConfig;
pub use dataset::{Dataset, DatasetIter};
pub use error::{DecodeError, LoaderErr, Result, StoreError};
pub use query::{QueryPlan, DEFAULT_PAGE_SIZE};
pub use record::{Field, Record};
pub use store::{Connection, MemoryStore, MongoConnection};
pub use tensor::{Scalar, ScalarKind, Tensor};
