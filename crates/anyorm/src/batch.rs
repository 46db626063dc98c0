//! Multi-row writers: one transaction per flush, all-or-nothing.
//!
//! [`BatchInserter`] writes a slice of models inside a single transaction,
//! optionally split into fixed-size chunks of one multi-row INSERT each.
//! [`StreamWriter`] buffers rows one at a time and flushes through a
//! [`BatchInserter`] when the buffer reaches its configured size or the
//! caller flushes explicitly. There is no background timer and no flush on
//! drop: rows still buffered when the writer is dropped are lost.
//!
//! A flush either lands completely or not at all. The [`BatchReport`]
//! mirrors that: every index in the input lands in `succeeded` or every
//! index lands in `failed`, with the voiding error carried alongside.
//! Finer-grained per-row attribution is deliberately not attempted.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{BatchInserter, StreamWriter};
//!
//! let report = BatchInserter::new().insert(&mut client, &users).await?;
//! assert!(report.is_complete());
//!
//! let mut writer = StreamWriter::new(&mut client, 500);
//! for user in feed {
//!     writer.push(user).await?;
//! }
//! writer.flush().await?;
//! ```

use std::marker::PhantomData;

use crate::client::{Connection, Executor, Tx};
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::schema::{Schema, schema_of};
use crate::stmt::build_insert_batch;

/// Outcome of one flush: parallel index lists into the flushed input.
///
/// Flushes are all-or-nothing, so one of the two lists is always empty.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Input positions written and committed.
    pub succeeded: Vec<usize>,
    /// Input positions rolled back.
    pub failed: Vec<usize>,
    /// The failure that voided the flush, when there was one.
    pub error: Option<OrmError>,
}

impl BatchReport {
    fn succeeded_for(count: usize) -> Self {
        Self {
            succeeded: (0..count).collect(),
            failed: Vec::new(),
            error: None,
        }
    }

    fn failed_for(count: usize, error: OrmError) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: (0..count).collect(),
            error: Some(error),
        }
    }

    /// Whether every row of the flush was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ==================== Batch inserter ====================

/// Writes a slice of models in one transaction.
pub struct BatchInserter<T> {
    chunk_rows: usize,
    _model: PhantomData<fn() -> T>,
}

impl<T: Model> BatchInserter<T> {
    /// An inserter that writes the whole slice as one multi-row INSERT.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_rows: 0,
            _model: PhantomData,
        }
    }

    /// Cap rows per statement; the flush stays one transaction.
    ///
    /// Numbered-placeholder dialects bound the parameters one statement may
    /// carry, so large slices have to split. Zero means unchunked.
    #[must_use]
    pub fn chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows;
        self
    }

    /// Write `models` inside one transaction.
    ///
    /// Statement-building failures abort before anything is written and
    /// propagate as errors. Execution and commit failures roll the
    /// transaction back and come back as a fully-failed [`BatchReport`].
    pub async fn insert<C: Connection>(
        &self,
        conn: &mut C,
        models: &[T],
    ) -> OrmResult<BatchReport> {
        if models.is_empty() {
            return Ok(BatchReport::default());
        }
        let schema = schema_of::<T>()?;
        let tx = conn.begin().await?;
        match write_chunks(&tx, schema, models, self.chunk_rows).await {
            Ok(()) => match tx.commit().await {
                Ok(()) => Ok(BatchReport::succeeded_for(models.len())),
                Err(err) => Ok(BatchReport::failed_for(models.len(), err)),
            },
            Err(err @ (OrmError::Statement(_) | OrmError::Schema(_))) => {
                tx.rollback().await.ok();
                Err(err)
            }
            Err(err) => {
                tx.rollback().await.ok();
                Ok(BatchReport::failed_for(models.len(), err))
            }
        }
    }
}

impl<T: Model> Default for BatchInserter<T> {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_chunks<T: Model, E: Executor>(
    executor: &E,
    schema: &Schema,
    models: &[T],
    chunk_rows: usize,
) -> OrmResult<()> {
    let size = if chunk_rows == 0 {
        models.len()
    } else {
        chunk_rows
    };
    for chunk in models.chunks(size) {
        let stmt = build_insert_batch(executor.placeholder(), T::TABLE, schema, chunk)?;
        executor.execute(&stmt.query, &stmt.values).await?;
    }
    Ok(())
}

// ==================== Stream writer ====================

/// Buffers rows and flushes them in batches over a borrowed connection.
///
/// The final [`flush`](Self::flush) is the caller's job; the writer never
/// writes on drop.
pub struct StreamWriter<'c, C, T> {
    conn: &'c mut C,
    inserter: BatchInserter<T>,
    batch_size: usize,
    buffer: Vec<T>,
}

impl<'c, C: Connection, T: Model> StreamWriter<'c, C, T> {
    /// A writer flushing every `batch_size` rows (0 reads as 1).
    pub fn new(conn: &'c mut C, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            conn,
            inserter: BatchInserter::new(),
            batch_size,
            buffer: Vec::with_capacity(batch_size),
        }
    }

    /// Cap rows per statement within each flush.
    #[must_use]
    pub fn chunk_rows(mut self, rows: usize) -> Self {
        self.inserter = self.inserter.chunk_rows(rows);
        self
    }

    /// Buffer one row, flushing synchronously when the buffer fills.
    ///
    /// Returns the flush report when this push triggered one.
    pub async fn push(&mut self, model: T) -> OrmResult<Option<BatchReport>> {
        self.buffer.push(model);
        if self.buffer.len() >= self.batch_size {
            return Ok(Some(self.flush().await?));
        }
        Ok(None)
    }

    /// Write out everything still buffered.
    pub async fn flush(&mut self) -> OrmResult<BatchReport> {
        if self.buffer.is_empty() {
            return Ok(BatchReport::default());
        }
        let pending = std::mem::take(&mut self.buffer);
        self.inserter.insert(self.conn, &pending).await
    }

    /// Rows buffered and not yet flushed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
