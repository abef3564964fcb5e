use super::{Schema, Slot};
use crate::error::{LoaderErr, Result};
use crate::record::{Field, Record};
use crate::tensor::{with_kind, Scalar, ScalarKind, Tensor};

/// First-match-by-kind mapping.
///
/// For every kind, in `ScalarKind::ALL` order, the first slot of that kind
/// receives every scalar of that kind found on the records (vector fields
/// contribute each element). Kinds without a slot are skipped; a slot whose
/// kind never shows up on any record is an error.
pub(super) fn assign<R: Record>(schema: &Schema, records: &[R]) -> Result<Vec<(usize, Tensor)>> {
    let fields: Vec<Vec<Field>> = records.iter().map(Record::fields).collect();

    let mut out = Vec::new();
    for kind in ScalarKind::ALL {
        let Some(index) = schema.first_of_kind(kind) else {
            continue;
        };
        let slot = &schema.slots()[index];
        let rows = with_kind!(kind, T => gather::<T>(slot, &fields))?;
        out.push((index, rows));
    }

    Ok(out)
}

fn gather<T: Scalar>(slot: &Slot, records: &[Vec<Field>]) -> Result<Tensor> {
    let mut flat: Vec<T> = Vec::new();
    let mut width: Option<usize> = None;

    for fields in records {
        let before = flat.len();
        for field in fields {
            if let Some(values) = field.value().as_array::<T>() {
                flat.extend(values.iter().copied());
            }
        }

        let count = flat.len() - before;
        match width {
            None => width = Some(count),
            Some(expected) if expected != count => {
                return Err(LoaderErr::ShapeMismatch {
                    slot: slot.name().to_string(),
                    got: vec![count],
                    expected: vec![expected],
                });
            }
            Some(_) => {}
        }
    }

    if flat.is_empty() {
        return Err(LoaderErr::NoMatchingScalars(T::KIND));
    }

    let n = records.len();
    let width = flat.len() / n;
    let shape = match slot.shape() {
        Some(declared) if declared.iter().product::<usize>() == width => {
            let mut shape = vec![n];
            shape.extend_from_slice(declared);
            shape
        }
        Some(declared) => {
            return Err(LoaderErr::ShapeMismatch {
                slot: slot.name().to_string(),
                got: vec![width],
                expected: declared.to_vec(),
            });
        }
        None => vec![n, width],
    };

    Tensor::from_shape_vec(&shape, flat).map_err(|e| e.for_slot(slot.name()))
}
