use bson::{Bson, Document};

use super::{Field, Record};
use crate::error::DecodeError;
use crate::tensor::Tensor;

/// Untyped records: every numeric top-level field, in document order.
///
/// Doubles become `f64`, 32/64-bit integers `i32`/`i64`, booleans `bool`.
/// Arrays whose elements share one of those types keep it; arrays mixing
/// numeric types are promoted to `f64`. `_id`, strings and nested documents
/// are ignored.
impl Record for Document {
    fn decode(doc: &Document) -> Result<Self, DecodeError> {
        Ok(doc.clone())
    }

    fn fields(&self) -> Vec<Field> {
        self.iter()
            .filter(|(key, _)| key.as_str() != "_id")
            .filter_map(|(key, value)| to_tensor(value).map(|t| Field::new(key.clone(), t)))
            .collect()
    }
}

fn to_tensor(value: &Bson) -> Option<Tensor> {
    match value {
        Bson::Double(v) => Some(Tensor::scalar(*v)),
        Bson::Int32(v) => Some(Tensor::scalar(*v)),
        Bson::Int64(v) => Some(Tensor::scalar(*v)),
        Bson::Boolean(v) => Some(Tensor::scalar(*v)),
        Bson::Array(items) => array_tensor(items),
        _ => None,
    }
}

fn array_tensor(items: &[Bson]) -> Option<Tensor> {
    let same = match items.first()? {
        Bson::Double(_) => collect(items, |b| b.as_f64()),
        Bson::Int32(_) => collect(items, |b| b.as_i32()),
        Bson::Int64(_) => collect(items, |b| b.as_i64()),
        Bson::Boolean(_) => return collect(items, |b| b.as_bool()),
        _ => return None,
    };
    same.or_else(|| collect(items, as_number))
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn collect<T: crate::tensor::Scalar>(items: &[Bson], f: impl Fn(&Bson) -> Option<T>) -> Option<Tensor> {
    items
        .iter()
        .map(f)
        .collect::<Option<Vec<T>>>()
        .map(Tensor::from_vec)
}
