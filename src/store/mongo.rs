use bson::Document;
use log::debug;
use mongodb::sync::{Client, Cursor};

use super::{Collection, Connection, DocumentCursor, FindOptions};
use crate::error::{LoaderErr, Result, StoreError};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// A MongoDB deployment reached through the driver's blocking API.
///
/// The driver connects lazily: building the client only parses the URI,
/// servers are contacted on the first query.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
}

impl MongoConnection {
    /// # Errors
    /// `LoaderErr::Connection` if the URI is invalid or cannot be resolved.
    pub fn connect(uri: Option<&str>) -> Result<Self> {
        let uri = uri.unwrap_or(DEFAULT_URI);
        debug!(uri = uri; "creating mongodb client");

        let client = Client::with_uri_str(uri)
            .map_err(|e| LoaderErr::Connection(StoreError::Driver(e)))?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Connection for MongoConnection {
    fn collection(&self, database: &str, name: &str) -> Box<dyn Collection> {
        Box::new(MongoCollection {
            inner: self.client.database(database).collection::<Document>(name),
        })
    }
}

struct MongoCollection {
    inner: mongodb::sync::Collection<Document>,
}

impl Collection for MongoCollection {
    fn namespace(&self) -> String {
        self.inner.namespace().to_string()
    }

    fn find(&self, options: FindOptions) -> std::result::Result<Box<dyn DocumentCursor>, StoreError> {
        let mut find = self
            .inner
            .find(options.filter)
            .batch_size(options.batch_size);
        if let Some(projection) = options.projection {
            find = find.projection(projection);
        }
        if let Some(sort) = options.sort {
            find = find.sort(sort);
        }
        if let Some(skip) = options.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = options.limit {
            find = find.limit(limit);
        }

        let cursor = find.run()?;
        Ok(Box::new(MongoCursor::new(cursor)))
    }

    fn aggregate(
        &self,
        pipeline: &[Document],
        batch_size: u32,
    ) -> std::result::Result<Box<dyn DocumentCursor>, StoreError> {
        let cursor = self
            .inner
            .aggregate(pipeline.to_vec())
            .batch_size(batch_size)
            .run()?;
        Ok(Box::new(MongoCursor::new(cursor)))
    }
}

struct MongoCursor {
    inner: Cursor<Document>,
    error: Option<StoreError>,
}

impl MongoCursor {
    fn new(inner: Cursor<Document>) -> Self {
        Self { inner, error: None }
    }
}

impl DocumentCursor for MongoCursor {
    fn next_document(&mut self) -> Option<Document> {
        if self.error.is_some() {
            return None;
        }
        match self.inner.next()? {
            Ok(doc) => Some(doc),
            Err(e) => {
                self.error = Some(StoreError::Driver(e));
                None
            }
        }
    }

    fn last_error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }
}
