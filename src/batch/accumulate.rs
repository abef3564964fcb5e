use super::{default_map, Batch, Schema, SlotMap};
use crate::error::{LoaderErr, Result};
use crate::record::Record;
use crate::tensor::Tensor;

/// Folds `records` into a copy of `batch`.
///
/// Records that return an explicit [`SlotMap`] are stacked slot by slot;
/// records that don't go through default mapping. A batch mixing both is
/// rejected. With `overwrite` the touched slots are replaced, otherwise the
/// new rows are appended after the existing ones.
///
/// # Errors
/// - `NonUniformMappings` if the slot maps disagree or appended rows don't
///   line up with the existing ones.
/// - `NoMatchingScalars`, `ShapeMismatch`, `KindMismatch`, `UnknownSlot`
///   from the mapping itself.
///
/// `batch` is never modified.
pub fn accumulate<R: Record>(batch: &Batch, records: &[R], overwrite: bool) -> Result<Batch> {
    if records.is_empty() {
        return Ok(batch.clone());
    }

    let schema = batch.schema();
    let maps: Vec<Option<SlotMap>> = records
        .iter()
        .map(|r| r.slot_map(schema).filter(|m| !m.is_empty()))
        .collect();

    let explicit = maps.iter().filter(|m| m.is_some()).count();
    let rows = if explicit == 0 {
        default_map::assign(schema, records)?
    } else if explicit == records.len() {
        let maps: Vec<SlotMap> = maps.into_iter().flatten().collect();
        stack_maps(schema, &maps)?
    } else {
        return Err(LoaderErr::NonUniformMappings(format!(
            "{explicit} of {} records supplied an explicit slot map",
            records.len()
        )));
    };

    commit(batch, rows, overwrite)
}

/// [`accumulate`] for callers that already hold one slot map per record.
pub fn accumulate_maps(batch: &Batch, maps: &[SlotMap], overwrite: bool) -> Result<Batch> {
    if maps.is_empty() {
        return Ok(batch.clone());
    }
    let rows = stack_maps(batch.schema(), maps)?;
    commit(batch, rows, overwrite)
}

fn commit(batch: &Batch, rows: Vec<(usize, Tensor)>, overwrite: bool) -> Result<Batch> {
    let mut out = batch.clone();
    for (index, tensor) in rows {
        out.set(index, tensor, overwrite)?;
    }
    Ok(out)
}

fn check_uniform(maps: &[SlotMap]) -> Result<()> {
    let Some(first) = maps.first() else {
        return Ok(());
    };

    let names: Vec<&str> = first.names().collect();
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(LoaderErr::DuplicateSlot(name.to_string()));
        }
    }

    for (record, map) in maps.iter().enumerate().skip(1) {
        if map.len() != first.len() {
            return Err(LoaderErr::NonUniformMappings(format!(
                "record {record} maps {} slots, record 0 maps {}",
                map.len(),
                first.len()
            )));
        }
        for (position, (expected, got)) in names.iter().zip(map.names()).enumerate() {
            if *expected != got {
                return Err(LoaderErr::NonUniformMappings(format!(
                    "record {record} maps '{got}' at position {position}, record 0 maps '{expected}'"
                )));
            }
        }
    }

    Ok(())
}

fn stack_maps(schema: &Schema, maps: &[SlotMap]) -> Result<Vec<(usize, Tensor)>> {
    check_uniform(maps)?;

    let Some(first) = maps.first() else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(first.len());
    for (position, name) in first.names().enumerate() {
        let index = schema
            .position(name)
            .ok_or_else(|| LoaderErr::UnknownSlot(name.to_string()))?;
        let slot = &schema.slots()[index];

        let parts: Vec<&Tensor> = maps.iter().map(|m| m.value_at(position)).collect();
        if let Some(part) = parts.iter().find(|p| p.kind() != slot.kind()) {
            return Err(LoaderErr::KindMismatch {
                slot: name.to_string(),
                got: part.kind(),
                expected: slot.kind(),
            });
        }

        let stacked = Tensor::stack(&parts).map_err(|e| e.for_slot(name))?;
        if let Some(declared) = slot.shape() {
            if &stacked.shape()[1..] != declared {
                return Err(LoaderErr::ShapeMismatch {
                    slot: name.to_string(),
                    got: stacked.shape()[1..].to_vec(),
                    expected: declared.to_vec(),
                });
            }
        }

        out.push((index, stacked));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bson::Document;

    use super::*;
    use crate::error::DecodeError;
    use crate::record::Field;
    use crate::tensor::ScalarKind;

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .slot("features", ScalarKind::F32, &[2])
            .slot("labels", ScalarKind::I64, &[])
            .build()
            .unwrap()
    }

    /// Routes through default mapping.
    #[derive(Clone)]
    struct Plain(f32, f32, i64);

    impl Record for Plain {
        fn decode(_: &Document) -> std::result::Result<Self, DecodeError> {
            unreachable!()
        }

        fn fields(&self) -> Vec<Field> {
            vec![
                Field::scalar("a", self.0),
                Field::scalar("b", self.1),
                Field::scalar("y", self.2),
            ]
        }
    }

    /// Supplies its own map; `swap` flips slot order.
    struct Mapped {
        xs: Vec<f32>,
        y: i64,
        swap: bool,
    }

    impl Record for Mapped {
        fn decode(_: &Document) -> std::result::Result<Self, DecodeError> {
            unreachable!()
        }

        fn slot_map(&self, _: &Schema) -> Option<SlotMap> {
            let features = Tensor::from_vec(self.xs.clone());
            let labels = Tensor::scalar(self.y);
            Some(if self.swap {
                SlotMap::new().with("labels", labels).with("features", features)
            } else {
                SlotMap::new().with("features", features).with("labels", labels)
            })
        }
    }

    fn mapped(i: i64) -> Mapped {
        Mapped {
            xs: vec![i as f32, -(i as f32)],
            y: i,
            swap: false,
        }
    }

    fn plain(n: usize) -> Vec<Plain> {
        (0..n).map(|i| Plain(i as f32, 10.0 + i as f32, i as i64)).collect()
    }

    #[test]
    fn explicit_maps_stack_along_batch_axis() {
        let records: Vec<Mapped> = (0..3).map(mapped).collect();
        let batch = accumulate(&schema().empty_batch(), &records, true).unwrap();

        assert_eq!(batch.tensor("features").unwrap().shape(), &[3, 2]);
        assert_eq!(batch.tensor("labels").unwrap().shape(), &[3]);
        assert_eq!(
            batch.tensor("labels").unwrap().to_vec::<i64>().unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn reordered_maps_are_rejected_and_input_untouched() {
        let empty = schema().empty_batch();
        let mut records: Vec<Mapped> = (0..3).map(mapped).collect();
        records[2].swap = true;

        let res = accumulate(&empty, &records, true);
        assert!(matches!(res, Err(LoaderErr::NonUniformMappings(_))));
        assert_eq!(empty, schema().empty_batch());
    }

    #[test]
    fn maps_of_different_length_are_rejected() {
        let full = SlotMap::new()
            .with("features", Tensor::from_vec(vec![1.0_f32, 2.0]))
            .with("labels", Tensor::scalar(1_i64));
        let short = SlotMap::new().with("features", Tensor::from_vec(vec![3.0_f32, 4.0]));

        let res = accumulate_maps(&schema().empty_batch(), &[full, short], true);
        assert!(matches!(res, Err(LoaderErr::NonUniformMappings(_))));
    }

    #[test]
    fn unknown_and_mistyped_slots_are_rejected() {
        let unknown = SlotMap::new().with("weights", Tensor::scalar(1.0_f32));
        assert!(matches!(
            accumulate_maps(&schema().empty_batch(), &[unknown], true),
            Err(LoaderErr::UnknownSlot(_))
        ));

        let mistyped = SlotMap::new().with("labels", Tensor::scalar(1.0_f64));
        assert!(matches!(
            accumulate_maps(&schema().empty_batch(), &[mistyped], true),
            Err(LoaderErr::KindMismatch { .. })
        ));

        let wide = SlotMap::new().with("features", Tensor::from_vec(vec![1.0_f32; 3]));
        assert!(matches!(
            accumulate_maps(&schema().empty_batch(), &[wide], true),
            Err(LoaderErr::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_slot_in_one_map_is_rejected() {
        let twice = SlotMap::new()
            .with("labels", Tensor::scalar(1_i64))
            .with("labels", Tensor::scalar(2_i64));
        assert!(matches!(
            accumulate_maps(&schema().empty_batch(), &[twice], true),
            Err(LoaderErr::DuplicateSlot(_))
        ));
    }

    #[test]
    fn default_mapping_fills_by_kind() {
        let batch = accumulate(&schema().empty_batch(), &plain(4), true).unwrap();

        let features = batch.array::<f32>("features").unwrap();
        assert_eq!(features.shape(), &[4, 2]);
        assert_eq!(features.iter().last(), Some(&13.0));
        assert_eq!(batch.array::<i64>("labels").unwrap().shape(), &[4]);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn default_mapping_is_idempotent_with_overwrite() {
        let records = plain(5);
        let first = accumulate(&schema().empty_batch(), &records, true).unwrap();
        let again = accumulate(&first, &records, true).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn appending_halves_equals_overwriting_whole() {
        let records = plain(7);
        let (head, tail) = records.split_at(3);

        let step = accumulate(&schema().empty_batch(), head, false).unwrap();
        let step = accumulate(&step, tail, false).unwrap();
        let whole = accumulate(&schema().empty_batch(), &records, true).unwrap();

        assert_eq!(step, whole);
        assert_eq!(step.len(), 7);
    }

    #[test]
    fn appending_mismatched_rows_is_non_uniform() {
        let dynamic = Schema::builder()
            .dynamic("features", ScalarKind::F32)
            .build()
            .unwrap();

        let two = SlotMap::new().with("features", Tensor::from_vec(vec![1.0_f32, 2.0]));
        let three = SlotMap::new().with("features", Tensor::from_vec(vec![1.0_f32, 2.0, 3.0]));

        let batch = accumulate_maps(&dynamic.empty_batch(), &[two], false).unwrap();
        assert!(matches!(
            accumulate_maps(&batch, &[three], false),
            Err(LoaderErr::NonUniformMappings(_))
        ));
    }

    #[test]
    fn mixing_explicit_and_default_records_is_rejected() {
        struct Either(Option<i64>);

        impl Record for Either {
            fn decode(_: &Document) -> std::result::Result<Self, DecodeError> {
                unreachable!()
            }

            fn fields(&self) -> Vec<Field> {
                vec![Field::scalar("y", 0_i64)]
            }

            fn slot_map(&self, _: &Schema) -> Option<SlotMap> {
                self.0
                    .map(|y| SlotMap::new().with("labels", Tensor::scalar(y)))
            }
        }

        let res = accumulate(&schema().empty_batch(), &[Either(Some(1)), Either(None)], true);
        assert!(matches!(res, Err(LoaderErr::NonUniformMappings(_))));
    }

    #[test]
    fn no_records_leaves_batch_as_is() {
        let empty = schema().empty_batch();
        let out = accumulate::<Plain>(&empty, &[], false).unwrap();
        assert_eq!(out, empty);
    }
}
