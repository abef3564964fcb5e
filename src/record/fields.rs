//! Typed field access on raw documents.
//!
//! Numbers are accepted from any BSON numeric representation that converts
//! without loss of integrality: doubles feed float fields directly and
//! integer fields only when they carry no fractional part.

use bson::{Bson, Document};

use crate::error::DecodeError;

/// A value that can be read out of a single BSON element.
pub trait FromBson: Sized {
    const EXPECTED: &'static str;

    fn from_bson(value: &Bson) -> Option<Self>;
}

impl FromBson for bool {
    const EXPECTED: &'static str = "bool";

    fn from_bson(value: &Bson) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! from_bson_float {
    ($($ty:ty),*) => {$(
        impl FromBson for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_bson(value: &Bson) -> Option<Self> {
                match value {
                    Bson::Double(v) => Some(*v as $ty),
                    Bson::Int32(v) => Some(*v as $ty),
                    Bson::Int64(v) => Some(*v as $ty),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! from_bson_int {
    ($($ty:ty),*) => {$(
        impl FromBson for $ty {
            const EXPECTED: &'static str = stringify!($ty);

            fn from_bson(value: &Bson) -> Option<Self> {
                match value {
                    Bson::Int32(v) => <$ty>::try_from(*v).ok(),
                    Bson::Int64(v) => <$ty>::try_from(*v).ok(),
                    // i128 holds every whole double a 64-bit target can take; larger
                    // ones saturate to i128::MAX, which no target accepts
                    Bson::Double(v) if v.fract() == 0.0 => <$ty>::try_from(*v as i128).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

from_bson_float!(f32, f64);
from_bson_int!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Reads `key` from `doc` as `T`.
///
/// # Errors
/// - `DecodeError::Missing` if the key is absent.
/// - `DecodeError::Incompatible` if the stored type cannot become `T`.
pub fn get<T: FromBson>(doc: &Document, key: &str) -> Result<T, DecodeError> {
    let value = doc.get(key).ok_or_else(|| DecodeError::Missing {
        field: key.to_string(),
    })?;

    T::from_bson(value).ok_or_else(|| incompatible::<T>(key, value))
}

/// Reads `key` from `doc` as an array of `T`.
///
/// # Errors
/// Same as [`get`], applied to the array and to each element.
pub fn get_vec<T: FromBson>(doc: &Document, key: &str) -> Result<Vec<T>, DecodeError> {
    let value = doc.get(key).ok_or_else(|| DecodeError::Missing {
        field: key.to_string(),
    })?;

    let Bson::Array(items) = value else {
        return Err(DecodeError::Incompatible {
            field: key.to_string(),
            expected: "array",
            found: format!("{:?}", value.element_type()),
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            T::from_bson(item).ok_or_else(|| incompatible::<T>(&format!("{key}.{i}"), item))
        })
        .collect()
}

fn incompatible<T: FromBson>(key: &str, value: &Bson) -> DecodeError {
    DecodeError::Incompatible {
        field: key.to_string(),
        expected: T::EXPECTED,
        found: format!("{:?}", value.element_type()),
    }
}

pub fn get_bool(doc: &Document, key: &str) -> Result<bool, DecodeError> {
    get(doc, key)
}

pub fn get_i32(doc: &Document, key: &str) -> Result<i32, DecodeError> {
    get(doc, key)
}

pub fn get_i64(doc: &Document, key: &str) -> Result<i64, DecodeError> {
    get(doc, key)
}

pub fn get_f32(doc: &Document, key: &str) -> Result<f32, DecodeError> {
    get(doc, key)
}

pub fn get_f64(doc: &Document, key: &str) -> Result<f64, DecodeError> {
    get(doc, key)
}

pub fn get_f32_vec(doc: &Document, key: &str) -> Result<Vec<f32>, DecodeError> {
    get_vec(doc, key)
}

pub fn get_f64_vec(doc: &Document, key: &str) -> Result<Vec<f64>, DecodeError> {
    get_vec(doc, key)
}
