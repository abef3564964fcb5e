use std::num::NonZeroUsize;

use bson::{doc, Document};

use crate::error::{LoaderErr, Result};
use crate::store::{Collection, DocumentCursor, FindOptions};

/// Records per batch when none is configured.
pub const DEFAULT_PAGE_SIZE: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(n) => n,
    None => unreachable!(),
};

/// What to read from a collection and how many records go into each batch.
///
/// A plan is a plain value: executing it opens a fresh cursor and never
/// changes the plan, so the same plan can be replayed for every epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Find {
        filter: Document,
        projection: Option<Document>,
        sort: Option<Document>,
        skip: Option<u64>,
        limit: Option<i64>,
        page_size: NonZeroUsize,
    },
    Aggregate {
        pipeline: Vec<Document>,
        page_size: NonZeroUsize,
    },
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self::find()
    }
}

impl QueryPlan {
    /// A find matching every document.
    pub fn find() -> Self {
        QueryPlan::Find {
            filter: Document::new(),
            projection: None,
            sort: None,
            skip: None,
            limit: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn aggregate(pipeline: impl IntoIterator<Item = Document>) -> Self {
        QueryPlan::Aggregate {
            pipeline: pipeline.into_iter().collect(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the find filter. On a pipeline, appends a `$match` stage.
    pub fn filter(mut self, filter: Document) -> Self {
        match &mut self {
            QueryPlan::Find { filter: f, .. } => *f = filter,
            QueryPlan::Aggregate { pipeline, .. } => pipeline.push(doc! { "$match": filter }),
        }
        self
    }

    /// Sets the projection. On a pipeline, appends a `$project` stage.
    pub fn projection(mut self, projection: Document) -> Self {
        match &mut self {
            QueryPlan::Find { projection: p, .. } => *p = Some(projection),
            QueryPlan::Aggregate { pipeline, .. } => {
                pipeline.push(doc! { "$project": projection })
            }
        }
        self
    }

    /// Sets the sort order. On a pipeline, appends a `$sort` stage.
    pub fn sort(mut self, sort: Document) -> Self {
        match &mut self {
            QueryPlan::Find { sort: s, .. } => *s = Some(sort),
            QueryPlan::Aggregate { pipeline, .. } => pipeline.push(doc! { "$sort": sort }),
        }
        self
    }

    /// Skips the first `n` results. On a pipeline, appends a `$skip` stage.
    pub fn skip(mut self, n: u64) -> Self {
        match &mut self {
            QueryPlan::Find { skip, .. } => *skip = Some(n),
            QueryPlan::Aggregate { pipeline, .. } => {
                pipeline.push(doc! { "$skip": i64::try_from(n).unwrap_or(i64::MAX) })
            }
        }
        self
    }

    /// Caps the number of results. On a pipeline, appends a `$limit` stage.
    ///
    /// A find follows the server's conventions: `0` means no limit and a
    /// negative value limits by its magnitude.
    pub fn limit(mut self, n: i64) -> Self {
        match &mut self {
            QueryPlan::Find { limit, .. } => *limit = Some(n),
            QueryPlan::Aggregate { pipeline, .. } => pipeline.push(doc! { "$limit": n }),
        }
        self
    }

    #[inline]
    pub fn page_size(&self) -> NonZeroUsize {
        match self {
            QueryPlan::Find { page_size, .. } | QueryPlan::Aggregate { page_size, .. } => {
                *page_size
            }
        }
    }

    /// A copy of this plan with a different page size.
    pub fn with_page_size(&self, page_size: NonZeroUsize) -> Self {
        let mut plan = self.clone();
        match &mut plan {
            QueryPlan::Find { page_size: p, .. } | QueryPlan::Aggregate { page_size: p, .. } => {
                *p = page_size
            }
        }
        plan
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, QueryPlan::Aggregate { .. })
    }

    /// Opens a cursor over `collection`. The page size is forwarded as the
    /// driver batch size.
    ///
    /// # Errors
    /// `LoaderErr::Store` if the store rejects the query.
    pub fn execute(&self, collection: &dyn Collection) -> Result<Box<dyn DocumentCursor>> {
        let batch_size = u32::try_from(self.page_size().get()).unwrap_or(u32::MAX);

        let cursor = match self {
            QueryPlan::Find {
                filter,
                projection,
                sort,
                skip,
                limit,
                ..
            } => collection.find(FindOptions {
                filter: filter.clone(),
                projection: projection.clone(),
                sort: sort.clone(),
                skip: *skip,
                limit: *limit,
                batch_size,
            }),
            QueryPlan::Aggregate { pipeline, .. } => collection.aggregate(pipeline, batch_size),
        };

        cursor.map_err(LoaderErr::Store)
    }
}
