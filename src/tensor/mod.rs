mod kind;

use std::{error::Error, fmt};

use ndarray::{concatenate, Array1, ArrayD, Axis, IxDyn};

pub use kind::{Scalar, ScalarKind};

use crate::error::LoaderErr;

/// Runs `$body` with `$t` bound to the Rust type behind `$kind`.
macro_rules! with_kind {
    ($kind:expr, $t:ident => $body:expr) => {
        match $kind {
            $crate::tensor::ScalarKind::Bool => {
                type $t = bool;
                $body
            }
            $crate::tensor::ScalarKind::I8 => {
                type $t = i8;
                $body
            }
            $crate::tensor::ScalarKind::I16 => {
                type $t = i16;
                $body
            }
            $crate::tensor::ScalarKind::I32 => {
                type $t = i32;
                $body
            }
            $crate::tensor::ScalarKind::I64 => {
                type $t = i64;
                $body
            }
            $crate::tensor::ScalarKind::U8 => {
                type $t = u8;
                $body
            }
            $crate::tensor::ScalarKind::U16 => {
                type $t = u16;
                $body
            }
            $crate::tensor::ScalarKind::U32 => {
                type $t = u32;
                $body
            }
            $crate::tensor::ScalarKind::U64 => {
                type $t = u64;
                $body
            }
            $crate::tensor::ScalarKind::F32 => {
                type $t = f32;
                $body
            }
            $crate::tensor::ScalarKind::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

/// Runs `$body` with `$a` bound to the typed array inside `$tensor`.
macro_rules! dispatch {
    ($tensor:expr, $a:ident => $body:expr) => {
        match $tensor {
            $crate::tensor::Tensor::Bool($a) => $body,
            $crate::tensor::Tensor::I8($a) => $body,
            $crate::tensor::Tensor::I16($a) => $body,
            $crate::tensor::Tensor::I32($a) => $body,
            $crate::tensor::Tensor::I64($a) => $body,
            $crate::tensor::Tensor::U8($a) => $body,
            $crate::tensor::Tensor::U16($a) => $body,
            $crate::tensor::Tensor::U32($a) => $body,
            $crate::tensor::Tensor::U64($a) => $body,
            $crate::tensor::Tensor::F32($a) => $body,
            $crate::tensor::Tensor::F64($a) => $body,
        }
    };
}

pub(crate) use with_kind;

/// A dense n-dimensional array of one scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Bool(ArrayD<bool>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

fn kind_of<T: Scalar>(_: &ArrayD<T>) -> ScalarKind {
    T::KIND
}

impl Tensor {
    /// A rank-0 tensor holding `value`.
    pub fn scalar<T: Scalar>(value: T) -> Self {
        T::wrap(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// A rank-1 tensor over `values`.
    pub fn from_vec<T: Scalar>(values: Vec<T>) -> Self {
        T::wrap(Array1::from(values).into_dyn())
    }

    /// Builds a tensor of the given shape from row-major scalars.
    ///
    /// # Errors
    /// `TensorErr::ElementCount` if `values` does not fill `shape` exactly.
    pub fn from_shape_vec<T: Scalar>(
        shape: &[usize],
        values: Vec<T>,
    ) -> std::result::Result<Self, TensorErr> {
        let got = values.len();
        ArrayD::from_shape_vec(IxDyn(shape), values)
            .map(T::wrap)
            .map_err(|_| TensorErr::ElementCount {
                shape: shape.to_vec(),
                got,
            })
    }

    /// A zero-row tensor whose rows have `row_shape`.
    pub fn empty(kind: ScalarKind, row_shape: &[usize]) -> Self {
        let mut shape = Vec::with_capacity(row_shape.len() + 1);
        shape.push(0);
        shape.extend_from_slice(row_shape);
        with_kind!(kind, T => T::wrap(ArrayD::<T>::default(IxDyn(&shape))))
    }

    pub fn kind(&self) -> ScalarKind {
        dispatch!(self, a => kind_of(a))
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the leading axis; zero for rank-0 tensors.
    pub fn rows(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn as_array<T: Scalar>(&self) -> Option<&ArrayD<T>> {
        T::view(self)
    }

    pub fn into_array<T: Scalar>(self) -> std::result::Result<ArrayD<T>, TensorErr> {
        T::unwrap(self).map_err(|t| TensorErr::KindMismatch {
            got: t.kind(),
            expected: T::KIND,
        })
    }

    /// Row-major copy of the elements, if the tensor holds `T`.
    pub fn to_vec<T: Scalar>(&self) -> Option<Vec<T>> {
        self.as_array::<T>().map(|a| a.iter().copied().collect())
    }

    pub fn reshape(&self, shape: &[usize]) -> std::result::Result<Tensor, TensorErr> {
        dispatch!(self, a => Tensor::from_shape_vec(shape, a.iter().copied().collect()))
    }

    /// Stacks same-shaped tensors along a new leading axis.
    ///
    /// # Errors
    /// - `TensorErr::Empty` if `parts` is empty.
    /// - `TensorErr::KindMismatch` if the parts hold different kinds.
    /// - `TensorErr::ShapeMismatch` if any part's shape differs from the first.
    pub fn stack(parts: &[&Tensor]) -> std::result::Result<Tensor, TensorErr> {
        let first = parts.first().ok_or(TensorErr::Empty)?;
        let row_shape = first.shape().to_vec();
        with_kind!(first.kind(), T => stack_typed::<T>(parts, &row_shape))
    }

    /// Concatenates `tail` after `self` along axis 0.
    ///
    /// # Errors
    /// `TensorErr::ShapeMismatch` if the non-leading dimensions differ.
    pub fn append(&self, tail: &Tensor) -> std::result::Result<Tensor, TensorErr> {
        with_kind!(self.kind(), T => append_typed::<T>(self, tail))
    }
}

fn stack_typed<T: Scalar>(
    parts: &[&Tensor],
    row_shape: &[usize],
) -> std::result::Result<Tensor, TensorErr> {
    let row_len: usize = row_shape.iter().product();
    let mut flat = Vec::with_capacity(parts.len() * row_len);

    for part in parts {
        let array = part.as_array::<T>().ok_or(TensorErr::KindMismatch {
            got: part.kind(),
            expected: T::KIND,
        })?;
        if array.shape() != row_shape {
            return Err(TensorErr::ShapeMismatch {
                got: array.shape().to_vec(),
                expected: row_shape.to_vec(),
            });
        }
        flat.extend(array.iter().copied());
    }

    let mut shape = Vec::with_capacity(row_shape.len() + 1);
    shape.push(parts.len());
    shape.extend_from_slice(row_shape);
    Tensor::from_shape_vec(&shape, flat)
}

fn append_typed<T: Scalar>(head: &Tensor, tail: &Tensor) -> std::result::Result<Tensor, TensorErr> {
    let mismatch = || TensorErr::ShapeMismatch {
        got: tail.shape().get(1..).unwrap_or_default().to_vec(),
        expected: head.shape().get(1..).unwrap_or_default().to_vec(),
    };

    let a = head.as_array::<T>().ok_or(TensorErr::KindMismatch {
        got: head.kind(),
        expected: T::KIND,
    })?;
    let b = tail.as_array::<T>().ok_or(TensorErr::KindMismatch {
        got: tail.kind(),
        expected: T::KIND,
    })?;

    if a.ndim() == 0 || a.ndim() != b.ndim() || a.shape()[1..] != b.shape()[1..] {
        return Err(mismatch());
    }

    concatenate(Axis(0), &[a.view(), b.view()])
        .map(T::wrap)
        .map_err(|_| mismatch())
}

/// Tensor-level failures, before a slot name is known.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorErr {
    KindMismatch {
        got: ScalarKind,
        expected: ScalarKind,
    },
    ShapeMismatch {
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    ElementCount {
        shape: Vec<usize>,
        got: usize,
    },
    Empty,
}

impl TensorErr {
    /// Attaches the slot the failing tensor was bound for.
    pub fn for_slot(self, slot: &str) -> LoaderErr {
        let slot = slot.to_string();
        match self {
            TensorErr::KindMismatch { got, expected } => LoaderErr::KindMismatch {
                slot,
                got,
                expected,
            },
            TensorErr::ShapeMismatch { got, expected } => LoaderErr::ShapeMismatch {
                slot,
                got,
                expected,
            },
            TensorErr::ElementCount { shape, got } => LoaderErr::ShapeMismatch {
                slot,
                got: vec![got],
                expected: shape,
            },
            TensorErr::Empty => {
                LoaderErr::NonUniformMappings(format!("slot '{slot}' received no tensors"))
            }
        }
    }
}

impl fmt::Display for TensorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorErr::KindMismatch { got, expected } => {
                write!(f, "kind mismatch: got {got}, expected {expected}")
            }
            TensorErr::ShapeMismatch { got, expected } => {
                write!(f, "shape mismatch: got {got:?}, expected {expected:?}")
            }
            TensorErr::ElementCount { shape, got } => {
                write!(f, "{got} elements cannot fill shape {shape:?}")
            }
            TensorErr::Empty => write!(f, "no tensors to combine"),
        }
    }
}

impl Error for TensorErr {}
