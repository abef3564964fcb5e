use std::{num::NonZeroUsize, sync::Arc};

use bson::{doc, Document};

use mongo_dataset::{
    iris::{self, IrisRecord},
    Connection, Dataset, DatasetConfig, DecodeError, LoaderErr, MemoryStore, QueryPlan,
};

fn iris_doc(i: i32) -> Document {
    doc! {
        "sepal_length": 5.0,
        "sepal_width": 3.0,
        "petal_length": 1.5,
        "petal_width": 0.2,
        "species": i % 3,
    }
}

fn dataset(store: &MemoryStore, page: usize) -> Dataset<IrisRecord> {
    Dataset::new(
        Arc::new(store.clone()),
        "tf",
        "iris_train",
        QueryPlan::find(),
        iris::schema().unwrap(),
    )
    .batched(NonZeroUsize::new(page).unwrap())
}

#[test]
fn decode_error_truncates_the_batch() {
    let store = MemoryStore::new();
    let mut docs: Vec<Document> = (0..6).map(iris_doc).collect();
    docs[3].remove("species");
    store.insert_many("tf", "iris_train", docs);

    let mut it = dataset(&store, 5).iter().unwrap();

    let first = it.next().unwrap();
    assert_eq!(first.len(), 3);
    assert!(matches!(
        it.last_error(),
        Some(LoaderErr::Decode(DecodeError::Missing { field })) if field == "species"
    ));

    // the failing document is consumed, reading resumes after it
    let rest = it.next().unwrap();
    assert_eq!(rest.len(), 2);
    assert!(it.next().is_none());
    assert_eq!(it.records_read(), 5);
}

#[test]
fn decode_error_on_first_document_skips_to_the_next_one() {
    let store = MemoryStore::new();
    store.insert_many(
        "tf",
        "iris_train",
        [doc! { "sepal_length": "long" }, iris_doc(1)],
    );

    let mut it = dataset(&store, 4).iter().unwrap();

    assert_eq!(it.next().map(|b| b.len()), Some(1));
    assert!(matches!(
        it.take_error(),
        Some(LoaderErr::Decode(DecodeError::Incompatible { .. }))
    ));
    assert!(it.next().is_none());
    assert!(it.is_exhausted());
}

#[test]
fn bad_document_does_not_end_the_epoch() {
    let store = MemoryStore::new();
    let mut docs: Vec<Document> = (0..6).map(iris_doc).collect();
    docs[2].remove("species");
    store.insert_many("tf", "iris_train", docs);

    for page in [1, 2] {
        let mut it = dataset(&store, page).iter().unwrap();
        let read: usize = it.by_ref().map(|b| b.len()).sum();

        assert_eq!(read, 5, "page={page}");
        assert_eq!(it.records_read(), 5);
        assert!(matches!(it.last_error(), Some(LoaderErr::Decode(_))));
    }
}

#[test]
fn only_bad_documents_end_cleanly() {
    let store = MemoryStore::new();
    store.insert_many(
        "tf",
        "iris_train",
        (0..3).map(|_| doc! { "species": 1 }),
    );

    let mut it = dataset(&store, 1).iter().unwrap();

    assert!(it.next().is_none());
    assert!(it.is_exhausted());
    assert_eq!(it.records_read(), 0);
    assert!(matches!(
        it.last_error(),
        Some(LoaderErr::Decode(DecodeError::Missing { .. }))
    ));
}

#[test]
fn cursor_failure_is_recorded_as_store_error() {
    let store = MemoryStore::new();
    store.insert_many("tf", "iris_train", (0..10).map(iris_doc));
    store.fail_cursors_after(Some(7));

    let mut it = dataset(&store, 4).iter().unwrap();
    let sizes: Vec<usize> = it.by_ref().map(|b| b.len()).collect();

    assert_eq!(sizes, vec![4, 3]);
    assert!(matches!(it.last_error(), Some(LoaderErr::Store(_))));
}

#[test]
fn config_builds_the_dataset() {
    let store = MemoryStore::new();
    store.insert_many("tf", "iris_test", (0..9).map(iris_doc));

    let config = DatasetConfig::from_json_str(
        r#"{
            "database": "tf",
            "collection": "iris_train",
            "page_size": 4,
            "filter": { "species": { "$gt": 0 } }
        }"#,
    )
    .unwrap()
    .apply_overrides(|k| (k == "MONGO_COLLECTION").then(|| "iris_test".to_string()))
    .unwrap();

    let conn: Arc<dyn Connection> = Arc::new(store);
    let ds: Dataset<IrisRecord> =
        Dataset::from_config(conn, &config, iris::schema().unwrap()).unwrap();

    assert_eq!(ds.namespace(), "tf.iris_test");
    let sizes: Vec<usize> = ds.iter().unwrap().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![4, 2]);
}
