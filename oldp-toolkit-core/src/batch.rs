//! Fixed-size chunking of the record stream.

use crate::contract::Record;
use crate::error::ConvertError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// An ordered, non-empty chunk of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Groups a fallible record stream into batches of `batch_size`.
///
/// The last batch holds the remainder. An upstream error is yielded as-is and
/// ends the sequence; the partially filled batch is dropped with it.
pub struct Batcher<I> {
    inner: I,
    batch_size: usize,
    done: bool,
}

impl<I> Batcher<I>
where
    I: Iterator<Item = Result<Record, ConvertError>>,
{
    pub fn new(inner: I, batch_size: usize) -> Result<Self, ConvertError> {
        validate_batch_size(batch_size)?;
        Ok(Self {
            inner,
            batch_size,
            done: false,
        })
    }
}

pub fn validate_batch_size(batch_size: usize) -> Result<(), ConvertError> {
    if batch_size == 0 {
        return Err(ConvertError::config("batch size must be greater than zero"));
    }
    Ok(())
}

impl<I> Iterator for Batcher<I>
where
    I: Iterator<Item = Result<Record, ConvertError>>,
{
    type Item = Result<Batch, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.inner.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if records.is_empty() {
            None
        } else {
            Some(Ok(Batch { records }))
        }
    }
}
