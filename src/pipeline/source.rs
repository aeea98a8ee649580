//! Row sources.
//!
//! A source is a lazy, finite, single-pass sequence of value tuples, one per
//! source row, in source column order. A failing item aborts the job; the
//! engine never retries.

use crate::pipeline::error::SourceError;
use crate::pipeline::row::Value;

/// Anything the publisher can pull source rows from.
pub trait RowSource: Send {
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>>;
}

/// Adapts an iterator of fallible rows.
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Result<Vec<Value>, SourceError>> + Send,
{
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I> RowSource for IterSource<I>
where
    I: Iterator<Item = Result<Vec<Value>, SourceError>> + Send,
{
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>> {
        self.inner.next()
    }
}

/// In-memory rows.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl VecSource {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// One single-column row per value.
    pub fn single_column<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(values.into_iter().map(|v| vec![v.into()]).collect())
    }
}

impl RowSource for VecSource {
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>> {
        self.rows.next().map(Ok)
    }
}

/// Lines of a reader, one single-column text row per line.
pub struct LineSource<R> {
    lines: std::io::Lines<R>,
}

impl<R: std::io::BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: std::io::BufRead + Send> RowSource for LineSource<R> {
    fn next_row(&mut self) -> Option<Result<Vec<Value>, SourceError>> {
        self.lines
            .next()
            .map(|line| line.map(|l| vec![Value::Text(l)]).map_err(Into::into))
    }
}
