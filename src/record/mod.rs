pub mod fields;
mod raw;

use std::borrow::Cow;

use bson::Document;
use serde::de::DeserializeOwned;

use crate::batch::{Schema, SlotMap};
use crate::error::DecodeError;
use crate::tensor::{Scalar, Tensor};

/// A typed view of one stored document.
///
/// A record provides its decoder plus at least one of:
/// - `fields`, consumed by the default first-match-by-kind mapping;
/// - `slot_map`, an explicit per-slot assignment.
pub trait Record: Sized {
    /// Converts a raw document into this record.
    ///
    /// # Errors
    /// Returns a `DecodeError` if a required field is missing or holds an
    /// incompatible BSON type.
    fn decode(doc: &Document) -> Result<Self, DecodeError>;

    /// Numeric fields in declaration order.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    /// Explicit slot assignment. `None` (or an empty map) selects default mapping.
    fn slot_map(&self, _schema: &Schema) -> Option<SlotMap> {
        None
    }
}

/// Decodes `doc` through serde, for records deriving `Deserialize`.
///
/// # Errors
/// Returns `DecodeError::Serde` with the deserializer's message.
pub fn decode_document<T: DeserializeOwned>(doc: &Document) -> Result<T, DecodeError> {
    Ok(bson::from_document(doc.clone())?)
}

/// One named value exposed by a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: Cow<'static, str>,
    value: Tensor,
}

impl Field {
    pub fn new(name: impl Into<Cow<'static, str>>, value: Tensor) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn scalar<T: Scalar>(name: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self::new(name, Tensor::scalar(value))
    }

    /// A fixed-length vector field.
    pub fn vector<T: Scalar>(name: impl Into<Cow<'static, str>>, values: Vec<T>) -> Self {
        Self::new(name, Tensor::from_vec(values))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &Tensor {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: f32,
        y: f32,
        label: i64,
    }

    #[test]
    fn serde_decoding_reads_typed_fields() {
        let p: Point = decode_document(&doc! { "x": 1.5, "y": 2, "label": 3_i64 }).unwrap();
        assert_eq!(
            p,
            Point {
                x: 1.5,
                y: 2.0,
                label: 3
            }
        );
    }

    #[test]
    fn serde_decoding_reports_missing_field() {
        let err = decode_document::<Point>(&doc! { "x": 1.5, "label": 1 }).unwrap_err();
        match err {
            DecodeError::Serde(msg) => assert!(msg.contains('y'), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn serde_decoding_rejects_strings_for_numbers() {
        let res = decode_document::<Point>(&doc! { "x": "one", "y": 2.0, "label": 1 });
        assert!(res.is_err());
    }

    #[test]
    fn field_constructors_shape_values() {
        let s = Field::scalar("w", 0.5_f64);
        assert_eq!(s.name(), "w");
        assert_eq!(s.value().shape(), &[] as &[usize]);

        let v = Field::vector("xs", vec![1_u8, 2, 3]);
        assert_eq!(v.value().shape(), &[3]);
    }
}
