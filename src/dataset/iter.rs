use std::{iter::FusedIterator, marker::PhantomData, num::NonZeroUsize, sync::Arc};

use log::{debug, info, warn};

use crate::batch::{accumulate, Batch, Schema};
use crate::error::LoaderErr;
use crate::record::Record;
use crate::store::DocumentCursor;

/// Pulls one page of records off a live cursor per batch.
///
/// Errors met while filling a batch do not end the iteration with a panic
/// or a `Result` item: they are kept in [`DatasetIter::last_error`].
/// A decode error truncates the batch being filled and reading resumes
/// after the failing document; an accumulation error drops the batch and
/// ends the iteration.
pub struct DatasetIter<R> {
    cursor: Box<dyn DocumentCursor>,
    page_size: NonZeroUsize,
    schema: Arc<Schema>,
    exhausted: bool,
    last_error: Option<LoaderErr>,
    records_read: usize,
    batches_yielded: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> DatasetIter<R> {
    pub(super) fn new(
        cursor: Box<dyn DocumentCursor>,
        page_size: NonZeroUsize,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            cursor,
            page_size,
            schema,
            exhausted: false,
            last_error: None,
            records_read: 0,
            batches_yielded: 0,
            _record: PhantomData,
        }
    }

    /// The most recent error met while filling a batch.
    #[inline]
    pub fn last_error(&self) -> Option<&LoaderErr> {
        self.last_error.as_ref()
    }

    /// Takes the most recent error, clearing it.
    pub fn take_error(&mut self) -> Option<LoaderErr> {
        self.last_error.take()
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Records decoded so far, across all batches.
    #[inline]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    #[inline]
    pub fn batches_yielded(&self) -> usize {
        self.batches_yielded
    }

    /// Decodes up to one page of records.
    fn fill(&mut self) -> Vec<R> {
        let mut records = Vec::with_capacity(self.page_size.get());

        while records.len() < self.page_size.get() {
            let Some(doc) = self.cursor.next_document() else {
                self.finish();
                break;
            };

            match R::decode(&doc) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        decoded = records.len();
                        "decode failed, truncating batch: {e}"
                    );
                    self.last_error = Some(LoaderErr::Decode(e));
                    break;
                }
            }
        }

        self.records_read += records.len();
        records
    }

    /// Marks the cursor as done, keeping any error it reported.
    fn finish(&mut self) {
        self.exhausted = true;
        match self.cursor.last_error() {
            Some(e) => {
                warn!("cursor stopped with an error: {e}");
                self.last_error = Some(LoaderErr::Store(e.clone()));
            }
            None => info!(records = self.records_read; "cursor exhausted"),
        }
    }
}

impl<R: Record> Iterator for DatasetIter<R> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.exhausted {
            return None;
        }

        // a page that decoded nothing is skipped; only the cursor ending stops us
        let records = loop {
            let records = self.fill();
            if !records.is_empty() {
                break records;
            }
            if self.exhausted {
                return None;
            }
        };

        match accumulate(&self.schema.empty_batch(), &records, true) {
            Ok(batch) => {
                self.batches_yielded += 1;
                debug!(
                    records = records.len(),
                    batch = self.batches_yielded;
                    "batch ready"
                );
                Some(batch)
            }
            Err(e) => {
                warn!("dropping batch: {e}");
                self.last_error = Some(e);
                self.exhausted = true;
                None
            }
        }
    }
}

impl<R: Record> FusedIterator for DatasetIter<R> {}
