mod iter;

use std::{fmt, marker::PhantomData, num::NonZeroUsize, sync::Arc};

use bson::Document;
use log::info;

pub use iter::DatasetIter;

use crate::batch::Schema;
use crate::config::DatasetConfig;
use crate::error::Result;
use crate::query::QueryPlan;
use crate::record::Record;
use crate::store::{Connection, MongoConnection};

/// A restartable sequence of batches read from one collection.
///
/// A dataset is only a description: it holds the connection handle, the
/// collection it reads, the query to run and the schema of the batches it
/// produces. Every call to [`Dataset::iter`] runs the query again on a
/// fresh cursor, so one dataset can be replayed once per epoch.
pub struct Dataset<R = Document> {
    conn: Arc<dyn Connection>,
    database: String,
    collection: String,
    plan: QueryPlan,
    schema: Arc<Schema>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Dataset<R> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            database: self.database.clone(),
            collection: self.collection.clone(),
            plan: self.plan.clone(),
            schema: Arc::clone(&self.schema),
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Dataset<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("plan", &self.plan)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<R: Record> Dataset<R> {
    /// Creates a dataset. No store I/O happens until [`Dataset::iter`].
    pub fn new(
        conn: Arc<dyn Connection>,
        database: impl Into<String>,
        collection: impl Into<String>,
        plan: QueryPlan,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            conn,
            database: database.into(),
            collection: collection.into(),
            plan,
            schema,
            _record: PhantomData,
        }
    }

    /// A dataset over a find query.
    ///
    /// # Args
    /// * `filter` - Documents to match; `None` matches everything.
    /// * `projection` - Fields to return; `None` returns whole documents.
    /// * `limit` - Maximum number of documents; `None` or `0` means no limit.
    pub fn find(
        conn: Arc<dyn Connection>,
        database: impl Into<String>,
        collection: impl Into<String>,
        filter: Option<Document>,
        projection: Option<Document>,
        limit: Option<i64>,
        schema: Arc<Schema>,
    ) -> Self {
        let mut plan = QueryPlan::find().filter(filter.unwrap_or_default());
        if let Some(projection) = projection {
            plan = plan.projection(projection);
        }
        if let Some(limit) = limit {
            plan = plan.limit(limit);
        }
        Self::new(conn, database, collection, plan, schema)
    }

    /// A dataset over an aggregation pipeline.
    pub fn aggregate(
        conn: Arc<dyn Connection>,
        database: impl Into<String>,
        collection: impl Into<String>,
        pipeline: impl IntoIterator<Item = Document>,
        schema: Arc<Schema>,
    ) -> Self {
        Self::new(
            conn,
            database,
            collection,
            QueryPlan::aggregate(pipeline),
            schema,
        )
    }

    /// A dataset reading a whole collection from the deployment at `uri`
    /// (`mongodb://localhost:27017` when `None`).
    ///
    /// # Errors
    /// `LoaderErr::Connection` if the URI is invalid.
    pub fn connect(
        uri: Option<&str>,
        database: impl Into<String>,
        collection: impl Into<String>,
        schema: Arc<Schema>,
    ) -> Result<Self> {
        let conn = MongoConnection::connect(uri)?;
        Ok(Self::new(
            Arc::new(conn),
            database,
            collection,
            QueryPlan::find(),
            schema,
        ))
    }

    /// Builds the dataset a config describes on top of `conn`.
    ///
    /// # Errors
    /// `LoaderErr::Config` if the config does not describe a valid query.
    pub fn from_config(
        conn: Arc<dyn Connection>,
        config: &DatasetConfig,
        schema: Arc<Schema>,
    ) -> Result<Self> {
        Ok(Self::new(
            conn,
            config.database(),
            config.collection(),
            config.plan()?,
            schema,
        ))
    }

    /// A copy of this dataset yielding batches of `page_size` records.
    pub fn batched(&self, page_size: NonZeroUsize) -> Self {
        self.with_plan(self.plan.with_page_size(page_size))
    }

    /// A copy of this dataset running `plan` instead.
    pub fn with_plan(&self, plan: QueryPlan) -> Self {
        Self {
            plan,
            ..self.clone()
        }
    }

    /// Reinterprets the documents as `S` records.
    pub fn for_record<S: Record>(&self) -> Dataset<S> {
        Dataset {
            conn: Arc::clone(&self.conn),
            database: self.database.clone(),
            collection: self.collection.clone(),
            plan: self.plan.clone(),
            schema: Arc::clone(&self.schema),
            _record: PhantomData,
        }
    }

    /// Runs the query and returns an iterator over its batches.
    ///
    /// # Errors
    /// `LoaderErr::Store` if the store rejects the query.
    pub fn iter(&self) -> Result<DatasetIter<R>> {
        let collection = self.conn.collection(&self.database, &self.collection);
        let cursor = self.plan.execute(collection.as_ref())?;

        let namespace = collection.namespace();
        info!(
            namespace = namespace.as_str(),
            page_size = self.page_size().get();
            "opened cursor"
        );
        Ok(DatasetIter::new(
            cursor,
            self.page_size(),
            Arc::clone(&self.schema),
        ))
    }

    #[inline]
    pub fn page_size(&self) -> NonZeroUsize {
        self.plan.page_size()
    }

    #[inline]
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// `database.collection`.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}
