//! Event capture for land engine runs.
//!
//! A `tracing` subscriber that files every info-level event under its target
//! as one row of a table. The engine logs completed operations with the
//! target naming the table:
//!
//! ```ignore
//! // In engine code:
//! tracing::info!(target: "parcel_merge", merged_id, constituents, area);
//!
//! // In a test:
//! let (result, log) = instrument::capture(|| engine.merge_parcels(&ids));
//! assert_eq!(log.count("parcel_merge"), 1);
//! let df = log.table("parcel_merge").unwrap().to_dataframe()?;
//! ```
//!
//! Tables are row-oriented while recording, since each event may carry a
//! different field set. Columns only materialize when a table is exported to
//! a polars `DataFrame`, at which point missing fields become nulls.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

/// A single recorded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::U64(v) => Some(*v),
            FieldValue::I64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F64(v) => Some(*v),
            FieldValue::U64(v) => Some(*v as f64),
            FieldValue::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn same_kind(&self, other: &FieldValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

pub type Row = BTreeMap<String, FieldValue>;

/// All events recorded under one target.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    pub rows: Vec<Row>,
}

impl EventTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Field names seen in any row, sorted.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    /// One entry per row; `None` where the row lacks the field.
    pub fn column(&self, name: &str) -> Vec<Option<&FieldValue>> {
        self.rows.iter().map(|row| row.get(name)).collect()
    }

    pub fn u64_column(&self, name: &str) -> Vec<Option<u64>> {
        self.rows
            .iter()
            .map(|row| row.get(name).and_then(FieldValue::as_u64))
            .collect()
    }

    pub fn str_column(&self, name: &str) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|row| row.get(name).and_then(FieldValue::as_str))
            .collect()
    }

    /// Convert this table to a polars DataFrame, one column per field name.
    ///
    /// A column takes the type of its first present value. If later rows
    /// disagree, the whole column is rendered as strings.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();

        for name in self.field_names() {
            let cells = self.column(name);
            let first = cells.iter().flatten().next();
            let uniform = first.is_some_and(|first| {
                cells.iter().flatten().all(|value| value.same_kind(first))
            });

            let column = match first {
                Some(FieldValue::U64(_)) if uniform => {
                    let values: Vec<Option<u64>> =
                        cells.iter().map(|c| c.and_then(FieldValue::as_u64)).collect();
                    Column::new(name.into(), values)
                }
                Some(FieldValue::I64(_)) if uniform => {
                    let values: Vec<Option<i64>> = cells
                        .iter()
                        .map(|c| match c {
                            Some(FieldValue::I64(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    Column::new(name.into(), values)
                }
                Some(FieldValue::F64(_)) if uniform => {
                    let values: Vec<Option<f64>> =
                        cells.iter().map(|c| c.and_then(FieldValue::as_f64)).collect();
                    Column::new(name.into(), values)
                }
                Some(FieldValue::Bool(_)) if uniform => {
                    let values: Vec<Option<bool>> = cells
                        .iter()
                        .map(|c| match c {
                            Some(FieldValue::Bool(v)) => Some(*v),
                            _ => None,
                        })
                        .collect();
                    Column::new(name.into(), values)
                }
                _ => {
                    let values: Vec<Option<String>> =
                        cells.iter().map(|c| c.map(ToString::to_string)).collect();
                    Column::new(name.into(), values)
                }
            };
            columns.push(column);
        }

        DataFrame::new(columns)
    }
}

/// Every table recorded on the current thread, keyed by tracing target.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub tables: BTreeMap<String, EventTable>,
}

impl EventLog {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    /// Number of events recorded under `target` (zero if none).
    pub fn count(&self, target: &str) -> usize {
        self.tables.get(target).map_or(0, EventTable::len)
    }
}

thread_local! {
    static LOG: RefCell<EventLog> = RefCell::default();
}

struct RowVisitor<'a> {
    row: &'a mut Row,
}

impl RowVisitor<'_> {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.row.insert(field.name().to_string(), value);
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, FieldValue::U64(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, FieldValue::I64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, FieldValue::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, FieldValue::Str(format!("{value:?}")));
    }
}

/// Tracing subscriber that appends each info-level event to the thread-local
/// [`EventLog`].
pub struct EventLogSubscriber;

impl Subscriber for EventLogSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        // Events only; rejected operations log at debug and are skipped.
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut row = Row::new();
        event.record(&mut RowVisitor { row: &mut row });

        let target = event.metadata().target().to_string();
        LOG.with(|log| {
            log.borrow_mut()
                .tables
                .entry(target)
                .or_default()
                .rows
                .push(row);
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Take everything recorded on this thread, leaving the log empty.
pub fn drain() -> EventLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Discard everything recorded on this thread.
pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = EventLog::default());
}

/// Run `f` with the subscriber scoped to this thread and return its result
/// together with the events it emitted.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, EventLog) {
    clear();
    let result = tracing::subscriber::with_default(EventLogSubscriber, f);
    (result, drain())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_grouped_by_target() {
        let ((), log) = capture(|| {
            tracing::info!(target: "parcel_split", parcel_id = 4u64, pieces = 2u64);
            tracing::info!(target: "parcel_assign", parcel_id = 4u64, owner = "A");
            tracing::info!(target: "parcel_split", parcel_id = 9u64, pieces = 6u64);
        });

        assert_eq!(log.count("parcel_split"), 2);
        assert_eq!(log.count("parcel_assign"), 1);
        assert_eq!(log.count("parcel_merge"), 0);

        let splits = log.table("parcel_split").unwrap();
        assert_eq!(splits.u64_column("pieces"), vec![Some(2), Some(6)]);
        let assigns = log.table("parcel_assign").unwrap();
        assert_eq!(assigns.str_column("owner"), vec![Some("A")]);
    }

    #[test]
    fn debug_events_are_not_recorded() {
        let ((), log) = capture(|| {
            tracing::debug!(target: "parcel_merge", reason = "NotContiguous");
        });
        assert!(log.tables.is_empty());
    }

    #[test]
    fn missing_fields_become_nulls_in_dataframe() {
        let ((), log) = capture(|| {
            tracing::info!(target: "terrain_sync", changed = 3u64, parcels = 100u64);
            tracing::info!(target: "terrain_sync", parcels = 100u64);
        });

        let df = log.table("terrain_sync").unwrap().to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
        let changed = df.column("changed").unwrap();
        assert_eq!(changed.null_count(), 1);
    }

    #[test]
    fn mixed_kinds_fall_back_to_strings() {
        let mut table = EventTable::default();
        let mut first = Row::new();
        first.insert("value".to_string(), FieldValue::U64(7));
        let mut second = Row::new();
        second.insert("value".to_string(), FieldValue::Str("seven".to_string()));
        table.rows.push(first);
        table.rows.push(second);

        let df = table.to_dataframe().unwrap();
        let column = df.column("value").unwrap();
        assert_eq!(column.dtype(), &DataType::String);
    }

    #[test]
    fn drain_empties_the_log() {
        let ((), log) = capture(|| {
            tracing::info!(target: "land_init", parcels = 100u64);
        });
        assert_eq!(log.count("land_init"), 1);
        assert!(drain().tables.is_empty());
    }
}
