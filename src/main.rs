use std::{env, sync::Arc};

use log::{info, warn};

use mongo_dataset::{
    iris::{self, IrisBatch, IrisRecord},
    Dataset, DatasetConfig, MongoConnection,
};

const DEFAULT_DATABASE: &str = "tf";
const DEFAULT_COLLECTION: &str = "iris_train";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => DatasetConfig::from_file(path)?,
        None => DatasetConfig::new(DEFAULT_DATABASE, DEFAULT_COLLECTION),
    }
    .with_env_overrides()?;

    let conn = Arc::new(MongoConnection::connect(config.uri())?);
    let dataset: Dataset<IrisRecord> = Dataset::from_config(conn, &config, iris::schema()?)?;
    info!("reading {} in pages of {}", dataset.namespace(), dataset.page_size());

    let mut batches = dataset.iter()?;
    for batch in batches.by_ref() {
        let batch = IrisBatch::try_from(batch)?;
        info!(
            "batch: features {:?}, labels {:?}",
            batch.features.shape(),
            batch.labels.shape()
        );
    }

    if let Some(e) = batches.last_error() {
        warn!("iteration stopped early: {e}");
    }
    info!(
        "read {} records in {} batches",
        batches.records_read(),
        batches.batches_yielded()
    );

    Ok(())
}
