use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset};
use derive_setters::Setters;
use ratatui::text::Line;
use tracing::{debug, trace};

use crate::domain::DEFAULT_TRIGGER_OFFSET;

/// Raw value of a cell as produced by a column accessor. Used for sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
}

impl CellValue {
    fn rank(&self) -> u8 {
        match self {
            CellValue::Empty => 0,
            CellValue::Bool(_) => 1,
            CellValue::Text(_) => 2,
            CellValue::Timestamp(_) => 3,
        }
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            // Case insensitive first, exact bytes break ties
            (CellValue::Text(a), CellValue::Text(b)) => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase))
                .then_with(|| a.cmp(b)),
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Timestamp(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

pub enum Header {
    Label(String),
    Render(fn() -> Line<'static>),
}

type Accessor<T> = Box<dyn Fn(&T) -> CellValue>;
type CellRenderer<T> = Box<dyn Fn(&CellValue, &T) -> Line<'static>>;

/// One column of a [`DataTable`].
pub struct ColumnDef<T> {
    pub id: &'static str,
    pub header: Header,
    accessor: Accessor<T>,
    cell: CellRenderer<T>,
    pub sortable: bool,
}

impl<T> ColumnDef<T> {
    pub fn new(
        id: &'static str,
        label: impl Into<String>,
        accessor: impl Fn(&T) -> CellValue + 'static,
    ) -> Self {
        Self {
            id,
            header: Header::Label(label.into()),
            accessor: Box::new(accessor),
            cell: Box::new(|value: &CellValue, _: &T| Line::from(value.to_string())),
            sortable: false,
        }
    }

    pub fn header_with(mut self, render: fn() -> Line<'static>) -> Self {
        self.header = Header::Render(render);
        self
    }

    pub fn cell(mut self, render: impl Fn(&CellValue, &T) -> Line<'static> + 'static) -> Self {
        self.cell = Box::new(render);
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn value(&self, row: &T) -> CellValue {
        (self.accessor)(row)
    }

    pub fn render_cell(&self, row: &T) -> Line<'static> {
        let value = self.value(row);
        (self.cell)(&value, row)
    }

    pub fn render_header(&self) -> Line<'static> {
        match &self.header {
            Header::Label(label) => Line::from(label.clone()),
            Header::Render(render) => render(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSort {
    pub column_id: &'static str,
    pub direction: SortDirection,
}

/// Active sort keys. This table keeps at most one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortingState(Vec<ColumnSort>);

impl SortingState {
    pub fn direction_of(&self, column_id: &str) -> Option<SortDirection> {
        self.0
            .iter()
            .find(|s| s.column_id == column_id)
            .map(|s| s.direction)
    }

    pub fn entries(&self) -> &[ColumnSort] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type LoadMore = Rc<dyn Fn()>;

/// Caller owned pagination state driving the sentinel row.
#[derive(Clone, Setters)]
pub struct InfiniteScroll {
    #[setters(skip)]
    pub load_more: LoadMore,
    pub has_more: bool,
    pub is_fetching: bool,
    #[setters(strip_option)]
    pub trigger_offset: Option<u16>, // in lines
}

impl InfiniteScroll {
    pub fn new(load_more: LoadMore) -> Self {
        Self {
            load_more,
            has_more: true,
            is_fetching: false,
            trigger_offset: None,
        }
    }

    pub fn margin(&self) -> u16 {
        self.trigger_offset.unwrap_or(DEFAULT_TRIGGER_OFFSET)
    }
}

impl fmt::Debug for InfiniteScroll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteScroll")
            .field("has_more", &self.has_more)
            .field("is_fetching", &self.is_fetching)
            .field("trigger_offset", &self.trigger_offset)
            .finish_non_exhaustive()
    }
}

/// Visible window of the table body, in lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub offset: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(offset: usize, height: usize) -> Self {
        Self { offset, height }
    }

    /// True if `line` lies inside the window grown by `margin` on both ends.
    pub fn is_near(&self, line: usize, margin: usize) -> bool {
        line + margin >= self.offset && line < self.offset + self.height + margin
    }
}

pub struct HeaderCell {
    pub id: &'static str,
    pub content: Line<'static>,
    pub sortable: bool,
    pub sorted: Option<SortDirection>,
}

pub struct BodyRow {
    pub index: usize, // index into the caller's rows
    pub cells: Vec<Line<'static>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
    pub fetching: bool,
}

impl Sentinel {
    pub fn message(&self) -> &'static str {
        if self.fetching {
            "Loading more records..."
        } else {
            "Scroll to load more"
        }
    }
}

pub enum TableBody {
    Empty,
    Rows {
        rows: Vec<BodyRow>,
        sentinel: Option<Sentinel>,
    },
}

/// Display model derived from columns, rows, scroll state and sort state.
pub struct TableModel {
    pub header: Vec<HeaderCell>,
    pub body: TableBody,
}

impl TableModel {
    pub fn is_empty(&self) -> bool {
        matches!(self.body, TableBody::Empty)
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        match &self.body {
            TableBody::Rows { sentinel, .. } => *sentinel,
            TableBody::Empty => None,
        }
    }

    pub fn rows(&self) -> &[BodyRow] {
        match &self.body {
            TableBody::Rows { rows, .. } => rows,
            TableBody::Empty => &[],
        }
    }
}

struct ObserverDeps {
    has_more: bool,
    is_fetching: bool,
    trigger_offset: u16,
    load_more: LoadMore,
}

impl ObserverDeps {
    fn from_config(scroll: &InfiniteScroll) -> Self {
        Self {
            has_more: scroll.has_more,
            is_fetching: scroll.is_fetching,
            trigger_offset: scroll.margin(),
            load_more: Rc::clone(&scroll.load_more),
        }
    }

    fn same(&self, other: &ObserverDeps) -> bool {
        self.has_more == other.has_more
            && self.is_fetching == other.is_fetching
            && self.trigger_offset == other.trigger_offset
            && Rc::ptr_eq(&self.load_more, &other.load_more)
    }
}

struct SentinelObserver {
    id: u64,
    deps: ObserverDeps,
    intersecting: bool,
}

pub struct DataTable<T> {
    columns: Vec<ColumnDef<T>>,
    sorting: SortingState,
    observer: Option<SentinelObserver>,
    observers_created: u64,
}

impl<T> DataTable<T> {
    pub fn new(columns: Vec<ColumnDef<T>>) -> Self {
        Self {
            columns,
            sorting: SortingState::default(),
            observer: None,
            observers_created: 0,
        }
    }

    pub fn columns(&self) -> &[ColumnDef<T>] {
        &self.columns
    }

    pub fn sorting(&self) -> &SortingState {
        &self.sorting
    }

    /// Cycles `column_id` through unsorted, ascending and descending.
    /// Returns false for unknown or non-sortable columns.
    pub fn toggle_sort(&mut self, column_id: &str) -> bool {
        let Some(column) = self.columns.iter().find(|c| c.id == column_id) else {
            trace!("Sort toggle on unknown column {column_id}");
            return false;
        };
        if !column.sortable {
            return false;
        }

        let next = match self.sorting.direction_of(column.id) {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        };
        self.sorting.0.clear();
        if let Some(direction) = next {
            self.sorting.0.push(ColumnSort {
                column_id: column.id,
                direction,
            });
        }
        debug!("Sorting is now {:?}", self.sorting);
        true
    }

    /// Display order of `rows` as indices into `rows`. Stable, so rows with
    /// equal keys keep the caller's order.
    pub fn row_order(&self, rows: &[T]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let Some(sort) = self.sorting.0.first() else {
            return order;
        };
        let Some(column) = self.columns.iter().find(|c| c.id == sort.column_id) else {
            return order;
        };

        let keys: Vec<CellValue> = rows.iter().map(|r| column.value(r)).collect();
        match sort.direction {
            SortDirection::Ascending => order.sort_by(|&a, &b| keys[a].cmp(&keys[b])),
            SortDirection::Descending => order.sort_by(|&a, &b| keys[b].cmp(&keys[a])),
        }
        order
    }

    #[cfg(test)]
    pub fn render(&self, rows: &[T], scroll: Option<&InfiniteScroll>) -> TableModel {
        self.render_window(rows, scroll, Viewport::new(0, rows.len()))
    }

    /// Renders the header, the body rows inside `viewport` and the sentinel.
    pub fn render_window(
        &self,
        rows: &[T],
        scroll: Option<&InfiniteScroll>,
        viewport: Viewport,
    ) -> TableModel {
        let header = self
            .columns
            .iter()
            .map(|c| HeaderCell {
                id: c.id,
                content: c.render_header(),
                sortable: c.sortable,
                sorted: if c.sortable {
                    self.sorting.direction_of(c.id)
                } else {
                    None
                },
            })
            .collect();

        if rows.is_empty() {
            return TableModel {
                header,
                body: TableBody::Empty,
            };
        }

        let order = self.row_order(rows);
        let rbegin = std::cmp::min(viewport.offset, order.len());
        let rend = std::cmp::min(rbegin + viewport.height, order.len());
        let body_rows = order[rbegin..rend]
            .iter()
            .map(|&index| BodyRow {
                index,
                cells: self
                    .columns
                    .iter()
                    .map(|c| c.render_cell(&rows[index]))
                    .collect(),
            })
            .collect();

        let sentinel = scroll.filter(|s| s.has_more).map(|s| Sentinel {
            fetching: s.is_fetching,
        });

        TableModel {
            header,
            body: TableBody::Rows {
                rows: body_rows,
                sentinel,
            },
        }
    }

    /// Feeds the current viewport to the sentinel observer. Invokes
    /// `load_more` once per transition of the sentinel into the trigger
    /// margin, unless a fetch is running or no more data exists. Returns
    /// whether `load_more` was called.
    pub fn observe(
        &mut self,
        rows_len: usize,
        scroll: Option<&InfiniteScroll>,
        viewport: Viewport,
    ) -> bool {
        // Without a mounted sentinel there is nothing to observe
        let Some(scroll) = scroll.filter(|s| s.has_more && rows_len > 0) else {
            self.disconnect();
            return false;
        };

        let deps = ObserverDeps::from_config(scroll);
        let margin = deps.trigger_offset as usize;
        let stale = self
            .observer
            .as_ref()
            .is_none_or(|observer| !observer.deps.same(&deps));
        if stale {
            self.disconnect();
            self.connect(deps);
        }

        let Some(observer) = self.observer.as_mut() else {
            return false;
        };
        let intersecting = viewport.is_near(rows_len, margin);
        let entered = intersecting && !observer.intersecting;
        observer.intersecting = intersecting;

        if entered && scroll.has_more && !scroll.is_fetching {
            trace!(
                "Sentinel at line {rows_len} entered {viewport:?} (margin {margin}), loading more"
            );
            (scroll.load_more)();
            return true;
        }
        false
    }

    /// Id of the connected observer, if any. Ids are never reused.
    #[cfg(test)]
    pub fn observer_id(&self) -> Option<u64> {
        self.observer.as_ref().map(|o| o.id)
    }

    fn connect(&mut self, deps: ObserverDeps) {
        self.observers_created += 1;
        trace!(
            "Observer {} connected: has_more {}, is_fetching {}, margin {}",
            self.observers_created, deps.has_more, deps.is_fetching, deps.trigger_offset
        );
        self.observer = Some(SentinelObserver {
            id: self.observers_created,
            deps,
            intersecting: false,
        });
    }

    fn disconnect(&mut self) {
        if let Some(observer) = self.observer.take() {
            trace!("Observer {} disconnected", observer.id);
        }
    }
}
