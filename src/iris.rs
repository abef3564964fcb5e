//! The iris measurements dataset, as stored in `tf.iris_train`.
//!
//! Each document holds four measurements and an integer class label:
//!
//! ```json
//! { "sepal_length": 5.1, "sepal_width": 3.5, "petal_length": 1.4, "petal_width": 0.2, "species": 0 }
//! ```

use std::sync::Arc;

use bson::Document;
use ndarray::{Array1, Array2, ArrayD, Dimension, Ix1, Ix2};

use crate::batch::{Batch, Schema};
use crate::error::{DecodeError, LoaderErr, Result};
use crate::record::{fields, Field, Record};
use crate::tensor::{Scalar, ScalarKind};

pub const FEATURES: &str = "features";
pub const LABELS: &str = "labels";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrisRecord {
    pub sepal_length: f32,
    pub sepal_width: f32,
    pub petal_length: f32,
    pub petal_width: f32,
    pub species: i64,
}

impl Record for IrisRecord {
    fn decode(doc: &Document) -> std::result::Result<Self, DecodeError> {
        Ok(Self {
            sepal_length: fields::get_f32(doc, "sepal_length")?,
            sepal_width: fields::get_f32(doc, "sepal_width")?,
            petal_length: fields::get_f32(doc, "petal_length")?,
            petal_width: fields::get_f32(doc, "petal_width")?,
            species: fields::get_i64(doc, "species")?,
        })
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::scalar("sepal_length", self.sepal_length),
            Field::scalar("sepal_width", self.sepal_width),
            Field::scalar("petal_length", self.petal_length),
            Field::scalar("petal_width", self.petal_width),
            Field::scalar("species", self.species),
        ]
    }
}

/// `features: f32[4]`, `labels: i64[]`.
///
/// # Errors
/// Never fails in practice; the slot names are distinct.
pub fn schema() -> Result<Arc<Schema>> {
    Schema::builder()
        .slot(FEATURES, ScalarKind::F32, &[4])
        .slot(LABELS, ScalarKind::I64, &[])
        .build()
}

/// A batch of iris records as fixed-rank arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct IrisBatch {
    pub features: Array2<f32>,
    pub labels: Array1<i64>,
}

impl IrisBatch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl TryFrom<Batch> for IrisBatch {
    type Error = LoaderErr;

    fn try_from(batch: Batch) -> Result<Self> {
        Ok(Self {
            features: fixed::<f32, Ix2>(&batch, FEATURES)?,
            labels: fixed::<i64, Ix1>(&batch, LABELS)?,
        })
    }
}

fn fixed<T: Scalar, D: Dimension>(batch: &Batch, slot: &str) -> Result<ndarray::Array<T, D>> {
    let array: &ArrayD<T> = batch.array(slot)?;
    array
        .clone()
        .into_dimensionality::<D>()
        .map_err(|_| LoaderErr::ShapeMismatch {
            slot: slot.to_string(),
            got: array.shape().to_vec(),
            expected: vec![D::NDIM.unwrap_or(0)],
        })
}
