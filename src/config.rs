use std::{env, num::NonZeroUsize, path::Path};

use bson::Document;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{LoaderErr, Result};
use crate::query::{QueryPlan, DEFAULT_PAGE_SIZE};

/// Where to read a dataset from and how to page it.
///
/// Loaded from JSON:
///
/// ```json
/// {
///   "uri": "mongodb://localhost:27017",
///   "database": "tf",
///   "collection": "iris_train",
///   "page_size": 32,
///   "filter": { "species": { "$ne": 2 } },
///   "limit": 100
/// }
/// ```
///
/// `pipeline` replaces the find options (`filter`, `projection`, `sort`,
/// `skip`, `limit`); setting both is an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    #[serde(default)]
    uri: Option<String>,
    database: String,
    collection: String,
    #[serde(default = "default_page_size")]
    page_size: NonZeroUsize,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    projection: Option<Value>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    skip: Option<u64>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    pipeline: Option<Vec<Value>>,
}

fn default_page_size() -> NonZeroUsize {
    DEFAULT_PAGE_SIZE
}

impl DatasetConfig {
    /// A config reading all of `database.collection` with the default page size.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            uri: None,
            database: database.into(),
            collection: collection.into(),
            page_size: DEFAULT_PAGE_SIZE,
            filter: None,
            projection: None,
            sort: None,
            skip: None,
            limit: None,
            pipeline: None,
        }
    }

    /// # Errors
    /// `LoaderErr::Config` if `json` is not a valid config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// `LoaderErr::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoaderErr::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Applies `MONGO_URI`, `MONGO_DB`, `MONGO_COLLECTION` and `PAGE_SIZE`
    /// from the process environment.
    ///
    /// # Errors
    /// `LoaderErr::Config` if `PAGE_SIZE` is not a positive integer.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides looked up by variable name.
    ///
    /// # Errors
    /// `LoaderErr::Config` if `PAGE_SIZE` is not a positive integer.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(uri) = lookup("MONGO_URI") {
            self.uri = Some(uri);
        }
        if let Some(database) = lookup("MONGO_DB") {
            self.database = database;
        }
        if let Some(collection) = lookup("MONGO_COLLECTION") {
            self.collection = collection;
        }
        if let Some(page_size) = lookup("PAGE_SIZE") {
            self.page_size = page_size
                .trim()
                .parse()
                .map_err(|e| LoaderErr::Config(format!("PAGE_SIZE '{page_size}': {e}")))?;
        }
        Ok(self)
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_page_size(mut self, page_size: NonZeroUsize) -> Self {
        self.page_size = page_size;
        self
    }

    #[inline]
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    #[inline]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[inline]
    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    /// The query this config describes.
    ///
    /// # Errors
    /// `LoaderErr::Config` if a JSON query part is not an object, or if a
    /// pipeline is combined with find options.
    pub fn plan(&self) -> Result<QueryPlan> {
        let plan = match &self.pipeline {
            Some(stages) => {
                if self.has_find_options() {
                    return Err(LoaderErr::Config(
                        "pipeline cannot be combined with filter, projection, sort, skip or limit"
                            .into(),
                    ));
                }
                let stages = stages
                    .iter()
                    .enumerate()
                    .map(|(i, stage)| to_document(&format!("pipeline[{i}]"), stage))
                    .collect::<Result<Vec<_>>>()?;
                QueryPlan::aggregate(stages)
            }
            None => {
                let mut plan = QueryPlan::find();
                if let Some(filter) = &self.filter {
                    plan = plan.filter(to_document("filter", filter)?);
                }
                if let Some(projection) = &self.projection {
                    plan = plan.projection(to_document("projection", projection)?);
                }
                if let Some(sort) = &self.sort {
                    plan = plan.sort(to_document("sort", sort)?);
                }
                if let Some(skip) = self.skip {
                    plan = plan.skip(skip);
                }
                if let Some(limit) = self.limit {
                    plan = plan.limit(limit);
                }
                plan
            }
        };

        Ok(plan.with_page_size(self.page_size))
    }

    fn has_find_options(&self) -> bool {
        self.filter.is_some()
            || self.projection.is_some()
            || self.sort.is_some()
            || self.skip.is_some()
            || self.limit.is_some()
    }
}

fn to_document(what: &str, value: &Value) -> Result<Document> {
    if !value.is_object() {
        return Err(LoaderErr::Config(format!("{what} must be a JSON object")));
    }
    bson::to_document(value).map_err(|e| LoaderErr::Config(format!("{what}: {e}")))
}
