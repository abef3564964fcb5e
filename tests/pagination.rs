use std::{num::NonZeroUsize, sync::Arc};

use bson::{doc, Document};

use mongo_dataset::{
    iris::{self, IrisBatch, IrisRecord},
    Dataset, LoaderErr, MemoryStore, QueryPlan, Schema, ScalarKind,
};

fn iris_doc(i: i32) -> Document {
    doc! {
        "_id": i,
        "sepal_length": 4.0 + f64::from(i % 10) * 0.1,
        "sepal_width": 3.0,
        "petal_length": 1.5,
        "petal_width": 0.2,
        "species": i % 3,
    }
}

fn iris_store(n: i32) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_many("tf", "iris_train", (0..n).map(iris_doc));
    store
}

fn iris_dataset(store: &MemoryStore) -> Dataset<IrisRecord> {
    Dataset::new(
        Arc::new(store.clone()),
        "tf",
        "iris_train",
        QueryPlan::find(),
        iris::schema().unwrap(),
    )
}

fn page(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn iris_batches_have_fixed_feature_width() {
    let store = iris_store(120);
    let ds = iris_dataset(&store).batched(page(32));

    let batches: Vec<IrisBatch> = ds
        .iter()
        .unwrap()
        .map(|b| IrisBatch::try_from(b).unwrap())
        .collect();

    assert_eq!(batches.len(), 4);
    for batch in &batches[..3] {
        assert_eq!(batch.features.shape(), &[32, 4]);
        assert_eq!(batch.labels.shape(), &[32]);
    }
    assert_eq!(batches[3].features.shape(), &[24, 4]);
    assert_eq!(batches[3].labels.shape(), &[24]);
}

#[test]
fn batch_count_is_ceil_of_records_over_page_size() {
    for (n, k) in [(10, 3), (9, 3), (1, 5), (5, 1)] {
        let store = iris_store(n);
        let mut it = iris_dataset(&store).batched(page(k)).iter().unwrap();

        let sizes: Vec<usize> = it.by_ref().map(|b| b.len()).collect();
        let n = n as usize;
        assert_eq!(sizes.len(), n.div_ceil(k), "n={n} k={k}");
        assert!(sizes[..sizes.len() - 1].iter().all(|s| *s == k));
        let last = if n % k == 0 { k } else { n % k };
        assert_eq!(sizes.last(), Some(&last));
        assert!(it.next().is_none());
        assert!(it.last_error().is_none());
    }
}

#[test]
fn every_iterator_replays_the_same_batches() {
    let store = iris_store(50);
    let ds = iris_dataset(&store).batched(page(16));

    let first: Vec<_> = ds.iter().unwrap().collect();
    let second: Vec<_> = ds.iter().unwrap().collect();

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
    assert_eq!(store.queries(), 2);
}

#[test]
fn interleaved_iterators_are_independent() {
    let store = iris_store(6);
    let ds = iris_dataset(&store).batched(page(2));

    let mut a = ds.iter().unwrap();
    let mut b = ds.iter().unwrap();
    a.next().unwrap();
    a.next().unwrap();

    assert_eq!(b.by_ref().count(), 3);
    assert_eq!(a.count(), 1);
}

#[test]
fn empty_collection_yields_nothing() {
    let store = MemoryStore::new();
    let mut it = iris_dataset(&store).iter().unwrap();

    assert!(it.next().is_none());
    assert!(it.is_exhausted());
    assert!(it.last_error().is_none());
}

#[test]
fn batched_leaves_the_receiver_untouched() {
    let store = iris_store(10);
    let ds = iris_dataset(&store);
    let small = ds.batched(page(4));

    assert_eq!(ds.page_size(), mongo_dataset::DEFAULT_PAGE_SIZE);
    assert_eq!(small.page_size(), page(4));
    assert_eq!(ds.iter().unwrap().count(), 1);
    assert_eq!(small.iter().unwrap().count(), 3);
}

#[test]
fn page_size_is_forwarded_as_batch_size() {
    let store = iris_store(10);
    let ds = iris_dataset(&store).batched(page(7));
    let _ = ds.iter().unwrap();

    assert_eq!(store.last_batch_size(), Some(7));
}

#[test]
fn find_filter_and_limit_narrow_the_data() {
    let store = iris_store(30);
    let ds: Dataset<IrisRecord> = Dataset::find(
        Arc::new(store.clone()),
        "tf",
        "iris_train",
        Some(doc! { "species": 1 }),
        None,
        Some(4),
        iris::schema().unwrap(),
    );

    let batches: Vec<IrisBatch> = ds
        .iter()
        .unwrap()
        .map(|b| IrisBatch::try_from(b).unwrap())
        .collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].labels.to_vec(), vec![1, 1, 1, 1]);
}

#[test]
fn aggregation_pipelines_are_paginated_too() {
    let store = iris_store(20);
    let ds: Dataset<IrisRecord> = Dataset::aggregate(
        Arc::new(store.clone()),
        "tf",
        "iris_train",
        [
            doc! { "$match": { "species": { "$in": [0, 2] } } },
            doc! { "$sort": { "_id": -1 } },
        ],
        iris::schema().unwrap(),
    )
    .batched(page(5));

    let sizes: Vec<usize> = ds.iter().unwrap().map(|b| b.len()).collect();
    // ids 0..20 with species 0 or 2: 7 + 6
    assert_eq!(sizes, vec![5, 5, 3]);
}

#[test]
fn raw_documents_use_default_mapping() {
    let store = MemoryStore::new();
    store.insert_many(
        "db",
        "points",
        (0..5).map(|i| doc! { "_id": i, "x": f64::from(i), "y": f64::from(i) * 2.0, "tag": "p" }),
    );
    let schema = Schema::builder()
        .dynamic("xy", ScalarKind::F64)
        .build()
        .unwrap();
    let ds: Dataset = Dataset::new(
        Arc::new(store),
        "db",
        "points",
        QueryPlan::find(),
        schema,
    );

    let batch = ds.iter().unwrap().next().unwrap();
    let xy = batch.array::<f64>("xy").unwrap();
    assert_eq!(xy.shape(), &[5, 2]);
    let flat: Vec<f64> = xy.iter().copied().collect();
    assert_eq!(&flat[8..], &[4.0, 8.0]);
}

#[test]
fn rejected_query_fails_iter() {
    let store = iris_store(3);
    let ds = iris_dataset(&store).with_plan(QueryPlan::aggregate([doc! { "$facet": {} }]));

    assert!(matches!(ds.iter(), Err(LoaderErr::Store(_))));
}
