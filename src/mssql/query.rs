use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::{ColumnData, QueryItem, QueryStream, Row};
use tokio::runtime::Runtime;

use super::client::within;
use super::script::OUTPUT_MARKER;
use crate::error::{OperationContext, SqlHelperError};
use crate::results::{ColumnSet, DbRow};
use crate::types::RowValues;

/// Forward-only cursor over the rows of one command, handed to query callbacks.
///
/// Rows are pulled from the server one at a time; nothing is buffered beyond what the driver
/// holds. Procedures may return several result sets; [`RowCursor::result_index`] tells them
/// apart.
pub struct RowCursor<'a> {
    runtime: &'a Runtime,
    stream: QueryStream<'a>,
    limit: Option<Duration>,
    context: OperationContext<'a>,
    columns: ColumnSet,
    result_index: usize,
    capturing_outputs: bool,
    outputs: Option<Row>,
    exhausted: bool,
}

impl<'a> RowCursor<'a> {
    pub(crate) fn new(
        runtime: &'a Runtime,
        stream: QueryStream<'a>,
        limit: Option<Duration>,
        context: OperationContext<'a>,
    ) -> Self {
        Self {
            runtime,
            stream,
            limit,
            context,
            columns: ColumnSet::default(),
            result_index: 0,
            capturing_outputs: false,
            outputs: None,
            exhausted: false,
        }
    }

    /// Fetch the next driver row, or `None` once every result set is consumed.
    ///
    /// # Errors
    /// Returns the wrapped driver error, or a timed-out error when the command timeout elapses
    /// while waiting for the row.
    pub fn next_row(&mut self) -> Result<Option<Row>, SqlHelperError> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            let item = self
                .runtime
                .block_on(within(self.limit, self.stream.try_next()))
                .map_err(|e| self.context.fail(e))?;
            match item {
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Some(QueryItem::Metadata(meta)) => {
                    let names: Vec<String> =
                        meta.columns().iter().map(|c| c.name().to_string()).collect();
                    self.capturing_outputs =
                        names.first().is_some_and(|name| name == OUTPUT_MARKER);
                    if !self.capturing_outputs {
                        self.columns = ColumnSet::new(names);
                        self.result_index = meta.result_index();
                    }
                }
                Some(QueryItem::Row(row)) => {
                    if self.capturing_outputs {
                        self.outputs = Some(row);
                        continue;
                    }
                    return Ok(Some(row));
                }
            }
        }
    }

    /// Fetch the next row converted into [`RowValues`].
    ///
    /// # Errors
    /// Same as [`RowCursor::next_row`].
    pub fn next_record(&mut self) -> Result<Option<DbRow>, SqlHelperError> {
        Ok(self
            .next_row()?
            .map(|row| DbRow::new(self.columns.clone(), self.result_index, row_values(&row))))
    }

    /// Column names of the current result set (empty before the first row is fetched).
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Index of the current result set, starting at 0.
    #[must_use]
    pub fn result_index(&self) -> usize {
        self.result_index
    }

    pub(crate) fn fail<E: Into<crate::error::BoxedSource>>(&self, source: E) -> SqlHelperError {
        self.context.fail(source)
    }

    /// Drain whatever the callback left unread and return the output-value row, if any.
    pub(crate) fn finish(mut self) -> Result<Option<Row>, SqlHelperError> {
        while self.next_row()?.is_some() {}
        Ok(self.outputs.take())
    }
}

/// Convert every cell of a driver row.
#[must_use]
pub fn row_values(row: &Row) -> Vec<RowValues> {
    (0..row.len()).map(|idx| cell_value(row, idx)).collect()
}

/// Convert the cell at `idx` into a [`RowValues`]; unknown and NULL cells become `Null`.
#[must_use]
pub fn cell_value(row: &Row, idx: usize) -> RowValues {
    let Some((_, data)) = row.cells().nth(idx) else {
        return RowValues::Null;
    };
    match data {
        ColumnData::Bit(Some(b)) => RowValues::Bool(*b),
        ColumnData::U8(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I16(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I32(Some(v)) => RowValues::Int(i64::from(*v)),
        ColumnData::I64(Some(v)) => RowValues::Int(*v),
        ColumnData::F32(Some(v)) => RowValues::Float(f64::from(*v)),
        ColumnData::F64(Some(v)) => RowValues::Float(*v),
        ColumnData::Numeric(Some(n)) => {
            let scaled = n.value();
            match (n.scale(), i64::try_from(scaled)) {
                (0, Ok(int)) => RowValues::Int(int),
                #[allow(clippy::cast_precision_loss)]
                (scale, _) => RowValues::Float(scaled as f64 / 10f64.powi(i32::from(scale))),
            }
        }
        ColumnData::String(Some(s)) => RowValues::Text(s.to_string()),
        ColumnData::Guid(Some(g)) => RowValues::Text(g.to_string().to_uppercase()),
        ColumnData::Binary(Some(b)) => RowValues::Blob(b.to_vec()),
        ColumnData::Xml(Some(xml)) => RowValues::Text(xml.to_string()),
        ColumnData::DateTime(Some(_))
        | ColumnData::SmallDateTime(Some(_))
        | ColumnData::DateTime2(Some(_)) => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, RowValues::Timestamp),
        ColumnData::Date(Some(_)) => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(RowValues::Null, RowValues::Timestamp),
        ColumnData::Time(Some(_)) => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, |t| RowValues::Text(t.to_string())),
        ColumnData::DateTimeOffset(Some(_)) => row
            .try_get::<DateTime<FixedOffset>, _>(idx)
            .ok()
            .flatten()
            .map_or(RowValues::Null, |dt| RowValues::Text(dt.to_rfc3339())),
        _ => RowValues::Null,
    }
}

/// First column of a row as text, for chunked `FOR XML` output.
pub(crate) fn first_column_text(row: &Row) -> Option<String> {
    match row.cells().next().map(|(_, data)| data) {
        Some(ColumnData::String(Some(s))) => Some(s.to_string()),
        Some(ColumnData::Xml(Some(xml))) => Some(xml.to_string()),
        _ => None,
    }
}
