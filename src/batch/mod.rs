mod accumulate;
mod default_map;
mod slot_map;

use std::sync::Arc;

use ndarray::ArrayD;

pub use accumulate::{accumulate, accumulate_maps};
pub use slot_map::SlotMap;

use crate::error::{LoaderErr, Result};
use crate::record::Record;
use crate::tensor::{Scalar, ScalarKind, Tensor};

/// A named, kind-typed tensor field of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    name: String,
    kind: ScalarKind,
    /// Per-record shape; `None` lets default mapping infer a flat row.
    shape: Option<Vec<usize>>,
}

impl Slot {
    pub fn new(name: impl Into<String>, kind: ScalarKind, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: Some(shape.to_vec()),
        }
    }

    /// A slot whose row width is taken from the data.
    pub fn dynamic(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            shape: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    #[inline]
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    fn placeholder(&self) -> Tensor {
        Tensor::empty(self.kind, self.shape().unwrap_or_default())
    }
}

/// Ordered slot table of a batch type. Doubles as the empty-batch factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    slots: Vec<Slot>,
}

impl Schema {
    /// # Errors
    /// `LoaderErr::DuplicateSlot` if two slots share a name.
    pub fn new(slots: impl IntoIterator<Item = Slot>) -> Result<Arc<Self>> {
        let slots: Vec<Slot> = slots.into_iter().collect();
        for (i, slot) in slots.iter().enumerate() {
            if slots[..i].iter().any(|s| s.name == slot.name) {
                return Err(LoaderErr::DuplicateSlot(slot.name.clone()));
            }
        }
        Ok(Arc::new(Self { slots }))
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// Index of the first slot of `kind`, in declaration order.
    pub fn first_of_kind(&self, kind: ScalarKind) -> Option<usize> {
        self.slots.iter().position(|s| s.kind == kind)
    }

    /// A batch with zero rows in every slot.
    pub fn empty_batch(self: &Arc<Self>) -> Batch {
        Batch::empty(Arc::clone(self))
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    slots: Vec<Slot>,
}

impl SchemaBuilder {
    pub fn slot(mut self, name: impl Into<String>, kind: ScalarKind, shape: &[usize]) -> Self {
        self.slots.push(Slot::new(name, kind, shape));
        self
    }

    pub fn dynamic(mut self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.slots.push(Slot::dynamic(name, kind));
        self
    }

    pub fn build(self) -> Result<Arc<Schema>> {
        Schema::new(self.slots)
    }
}

/// One tensor per schema slot, every tensor sharing the leading batch axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    schema: Arc<Schema>,
    tensors: Vec<Tensor>,
}

impl Batch {
    pub fn empty(schema: Arc<Schema>) -> Self {
        let tensors = schema.slots.iter().map(Slot::placeholder).collect();
        Self { schema, tensors }
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of rows, i.e. the largest leading dimension across slots.
    pub fn len(&self) -> usize {
        self.tensors.iter().map(Tensor::rows).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.schema.position(name).map(|i| &self.tensors[i])
    }

    /// # Panics
    /// If `index` is not a slot index of this batch's schema.
    #[inline]
    pub fn tensor_at(&self, index: usize) -> &Tensor {
        &self.tensors[index]
    }

    /// Typed access to a slot's array.
    ///
    /// # Errors
    /// - `LoaderErr::UnknownSlot` if the schema has no slot `name`.
    /// - `LoaderErr::KindMismatch` if the slot does not hold `T`.
    pub fn array<T: Scalar>(&self, name: &str) -> Result<&ArrayD<T>> {
        let tensor = self
            .tensor(name)
            .ok_or_else(|| LoaderErr::UnknownSlot(name.to_string()))?;
        tensor.as_array::<T>().ok_or_else(|| LoaderErr::KindMismatch {
            slot: name.to_string(),
            got: tensor.kind(),
            expected: T::KIND,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Tensor)> {
        self.schema.slots.iter().zip(&self.tensors)
    }

    pub fn into_tensors(self) -> Vec<Tensor> {
        self.tensors
    }

    /// In-place [`accumulate`]; the batch is left untouched on error.
    pub fn populate<R: Record>(&mut self, records: &[R], overwrite: bool) -> Result<()> {
        *self = accumulate(self, records, overwrite)?;
        Ok(())
    }

    /// Replaces or extends slot `index` with `rows`.
    fn set(&mut self, index: usize, rows: Tensor, overwrite: bool) -> Result<()> {
        let slot = &self.schema.slots[index];
        if rows.kind() != slot.kind {
            return Err(LoaderErr::KindMismatch {
                slot: slot.name.clone(),
                got: rows.kind(),
                expected: slot.kind,
            });
        }

        let current = &mut self.tensors[index];
        if overwrite || current.rows() == 0 {
            *current = rows;
            return Ok(());
        }

        *current = current.append(&rows).map_err(|e| match e {
            crate::tensor::TensorErr::ShapeMismatch { got, expected } => {
                LoaderErr::NonUniformMappings(format!(
                    "slot '{}' holds rows of shape {expected:?}, appended rows have {got:?}",
                    slot.name
                ))
            }
            other => other.for_slot(&slot.name),
        })?;
        Ok(())
    }
}
