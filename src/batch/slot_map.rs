use crate::tensor::Tensor;

/// Explicit per-record assignment of tensors to slots, in a fixed order.
///
/// Every record of a batch must produce a map with the same slots at the
/// same positions; the accumulator rejects anything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotMap {
    entries: Vec<(String, Tensor)>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`SlotMap::insert`].
    pub fn with(mut self, slot: impl Into<String>, value: Tensor) -> Self {
        self.insert(slot, value);
        self
    }

    pub fn insert(&mut self, slot: impl Into<String>, value: Tensor) {
        self.entries.push((slot.into(), value));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub(crate) fn value_at(&self, position: usize) -> &Tensor {
        &self.entries[position].1
    }
}

impl FromIterator<(String, Tensor)> for SlotMap {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
