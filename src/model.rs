use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, trace};
use tracing_error::SpanTrace;

use crate::account::{
    AccountInfo, AuthStatusFilter, IntakePage, IntakeSummary, LocationFilter, QueryParams,
};
use crate::columns::intake_columns;
use crate::detail::{AccountDetail, DetailSection, detail_sections, submission_summary};
use crate::domain::{HELP_TEXT, IntakeError, Message, TVConfig};
use crate::source::IntakeSource;
use crate::table::{
    DataTable, InfiniteScroll, LoadMore, SortDirection, TableBody, TableModel, Viewport,
};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, FILTER_HEIGHT, STATS_HEIGHT, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT,
};

// Lines scrolled per page in the detail view
const DETAIL_PAGE: u16 = 10;

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    DETAIL,
    POPUP,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Popup {
    Help(String),
    Detail {
        title: String,
        summary: String,
        sections: Vec<DetailSection>,
        scroll: u16,
    },
}

pub struct UIData {
    pub name: String,
    pub table: TableModel,
    pub widths: Vec<u16>,
    pub selected_row: Option<usize>, // relative to the first visible row
    pub selected_column: usize,
    pub nrows: usize,
    pub total_count: usize,
    pub loading: bool,
    pub statistics: IntakeSummary,
    pub location: LocationFilter,
    pub auth_status: AuthStatusFilter,
    pub sort_label: Option<String>,
    pub popup: Option<Popup>,
    pub status_message: String,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height
            .saturating_sub(STATS_HEIGHT + FILTER_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: Arc<IntakeSource>,
    sender: Sender<Message>,
    table: DataTable<AccountInfo>,
    rows: Vec<AccountInfo>,
    query: QueryParams,
    next_page: usize,
    has_more: bool,
    is_fetching: bool,
    generation: u64,
    load_more: LoadMore,
    statistics: IntakeSummary,
    total_count: usize,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    detail_idx: Option<usize>, // index into rows
    detail_scroll: u16,
    popup: Option<Popup>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        source: Arc<IntakeSource>,
        sender: Sender<Message>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, IntakeError> {
        if config.page_size == 0 {
            return Err(IntakeError::InvalidQuery("page size must be positive".into()));
        }

        // One stable loader for the lifetime of the model, so the table only
        // rebuilds its observer when the pagination flags change.
        let load_more: LoadMore = {
            let sender = sender.clone();
            Rc::new(move || {
                if sender.send(Message::LoadMore).is_err() {
                    error!("Message channel closed, cannot request more accounts");
                }
            })
        };

        let uilayout = UILayout::from_values(ui_width, ui_height);
        let table = DataTable::new(intake_columns());
        let mut model = Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            query: QueryParams {
                page_size: config.page_size,
                ..QueryParams::default()
            },
            sender,
            table,
            rows: Vec::new(),
            next_page: 1,
            has_more: true,
            is_fetching: false,
            generation: 0,
            load_more,
            statistics: source.statistics(),
            total_count: 0,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            detail_idx: None,
            detail_scroll: 0,
            popup: None,
            uidata: Self::empty_uidata(source.name()),
            uilayout,
            source,
            status_message: "Loading ...".to_string(),
        };
        model.request_page(1);
        model.refresh();
        Ok(model)
    }

    fn empty_uidata(name: &str) -> UIData {
        UIData {
            name: name.to_string(),
            table: TableModel {
                header: Vec::new(),
                body: TableBody::Empty,
            },
            widths: Vec::new(),
            selected_row: None,
            selected_column: 0,
            nrows: 0,
            total_count: 0,
            loading: true,
            statistics: IntakeSummary::default(),
            location: LocationFilter::All,
            auth_status: AuthStatusFilter::All,
            sort_label: None,
            popup: None,
            status_message: String::new(),
        }
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[AccountInfo] {
        &self.rows
    }

    #[cfg(test)]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[cfg(test)]
    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn scroll_config(&self) -> InfiniteScroll {
        InfiniteScroll::new(Rc::clone(&self.load_more))
            .has_more(self.has_more)
            .is_fetching(self.is_fetching)
            .trigger_offset(self.config.trigger_offset)
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(self.offset_row, self.uilayout.table_height)
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), IntakeError> {
        if let Some(msg) = message {
            match msg {
                // Data messages are handled in every mode
                Message::LoadMore => self.load_more(),
                Message::PageLoaded { generation, result } => self.page_loaded(generation, result),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Quit => self.quit(),
                msg => match self.modus {
                    Modus::TABLE => match msg {
                        Message::MoveDown => self.move_table_selection_down(1),
                        Message::MoveUp => self.move_table_selection_up(1),
                        Message::MovePageDown => {
                            self.move_table_selection_down(self.uilayout.table_height.max(1))
                        }
                        Message::MovePageUp => {
                            self.move_table_selection_up(self.uilayout.table_height.max(1))
                        }
                        Message::MoveBeginning => self.select_row(0),
                        Message::MoveEnd => self.select_row(self.rows.len().saturating_sub(1)),
                        Message::MoveLeft => {
                            self.curser_column = self.curser_column.saturating_sub(1)
                        }
                        Message::MoveRight => {
                            let last = self.table.columns().len().saturating_sub(1);
                            self.curser_column = std::cmp::min(self.curser_column + 1, last);
                        }
                        Message::ToggleSort => self.toggle_sort(),
                        Message::Enter => self.enter(),
                        Message::Help => self.show_help(),
                        Message::CycleLocation => {
                            self.query.preferred_location = self.query.preferred_location.next();
                            self.reload();
                        }
                        Message::CycleAuthStatus => {
                            self.query.auth_status = self.query.auth_status.next();
                            self.reload();
                        }
                        Message::Reload => self.reload(),
                        _ => (),
                    },
                    Modus::DETAIL => match msg {
                        Message::MoveLeft => self.previous_record(),
                        Message::MoveRight => self.next_record(),
                        Message::MoveUp => self.scroll_detail_up(1),
                        Message::MoveDown => self.scroll_detail_down(1),
                        Message::MovePageUp => self.scroll_detail_up(DETAIL_PAGE),
                        Message::MovePageDown => self.scroll_detail_down(DETAIL_PAGE),
                        Message::MoveBeginning => self.scroll_detail_up(u16::MAX),
                        Message::Exit | Message::Enter => self.exit(),
                        Message::Help => self.show_help(),
                        _ => (),
                    },
                    Modus::POPUP => {
                        if let Message::Exit | Message::Enter = msg {
                            self.exit()
                        }
                    }
                },
            }
        }

        self.refresh();
        Ok(())
    }

    // Runs the sentinel observer against the current state and rebuilds the ui data.
    fn refresh(&mut self) {
        let scroll = self.scroll_config();
        let viewport = self.viewport();
        if self.table.observe(self.rows.len(), Some(&scroll), viewport) {
            debug!("Sentinel visible, requested page {}", self.next_page);
        }
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        let scroll = self.scroll_config();
        let table = self
            .table
            .render_window(&self.rows, Some(&scroll), self.viewport());

        let widths = self
            .table
            .columns()
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                let header = table.header.get(cidx);
                let header_width = header.map(|h| h.content.width()).unwrap_or(0)
                    + if column.sortable { 2 } else { 0 };
                let cell_width = table
                    .rows()
                    .iter()
                    .filter_map(|r| r.cells.get(cidx).map(|c| c.width()))
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(header_width, cell_width) + COLUMN_WIDTH_MARGIN;
                std::cmp::min(width, self.config.max_column_width) as u16
            })
            .collect();

        let sort_label = self.table.sorting().entries().first().map(|sort| {
            let label = self
                .table
                .columns()
                .iter()
                .find(|c| c.id == sort.column_id)
                .map(|c| c.render_header().to_string())
                .unwrap_or_default();
            let direction = match sort.direction {
                SortDirection::Ascending => "ascending",
                SortDirection::Descending => "descending",
            };
            format!("{label} {direction}")
        });

        let selected_row = if self.rows.is_empty() {
            None
        } else {
            Some(self.curser_row)
        };

        self.uidata = UIData {
            name: self.source.name().to_string(),
            table,
            widths,
            selected_row,
            selected_column: self.curser_column,
            nrows: self.rows.len(),
            total_count: self.total_count,
            loading: self.status == Status::LOADING,
            statistics: self.statistics,
            location: self.query.preferred_location,
            auth_status: self.query.auth_status,
            sort_label,
            popup: self.popup.clone(),
            status_message: self.status_message.clone(),
        };
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        let abs = self.offset_row + self.curser_row;
        self.select_row(abs);
    }

    // -------------------- Loading ---------------------- //

    fn load_more(&mut self) {
        if self.is_fetching || !self.has_more {
            trace!(
                "Ignoring load request (fetching {}, more {})",
                self.is_fetching, self.has_more
            );
            return;
        }
        self.request_page(self.next_page);
    }

    fn request_page(&mut self, page: usize) {
        self.is_fetching = true;
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let query = QueryParams {
            page,
            ..self.query.clone()
        };
        let generation = self.generation;
        let latency = Duration::from_millis(self.config.latency_ms);
        debug!("Requesting page {page} (generation {generation})");

        rayon::spawn(move || {
            let span = info_span!("fetch_page", generation, page);
            let _entered = span.enter();
            if !latency.is_zero() {
                std::thread::sleep(latency);
            }
            let result = source.fetch_page(&query);
            if let Err(e) = &result {
                error!("Fetching page {page} failed: {e}\n{}", SpanTrace::capture());
            }
            if sender.send(Message::PageLoaded { generation, result }).is_err() {
                debug!("Model is gone, dropping page {page}");
            }
        });
    }

    fn page_loaded(&mut self, generation: u64, result: Result<IntakePage, IntakeError>) {
        if generation != self.generation {
            debug!(
                "Dropping page from generation {generation}, current is {}",
                self.generation
            );
            return;
        }
        self.is_fetching = false;
        self.status = Status::READY;

        match result {
            Ok(page) => {
                let start_time = Instant::now();
                self.has_more = page.has_more();
                self.next_page = page.pagination.page + 1;
                self.total_count = page.pagination.total_count;
                self.statistics = page.statistics;
                self.rows.extend(page.accounts);
                info!(
                    "Page {}/{} loaded, {} of {} accounts in the table ({}us)",
                    page.pagination.page,
                    page.pagination.total_pages,
                    self.rows.len(),
                    self.total_count,
                    start_time.elapsed().as_micros()
                );
                let message = if self.has_more {
                    format!("Loaded {} of {} accounts", self.rows.len(), self.total_count)
                } else {
                    format!("You're all caught up ({} accounts)", self.rows.len())
                };
                self.set_status_message(message);
            }
            Err(e) => {
                // Keep what we have and stop loading until the user reloads
                self.has_more = false;
                self.set_status_message(format!("Loading accounts failed: {e} (r to retry)"));
            }
        }
    }

    fn reload(&mut self) {
        self.generation += 1;
        self.rows.clear();
        self.next_page = 1;
        self.has_more = true;
        self.total_count = 0;
        self.curser_row = 0;
        self.offset_row = 0;
        self.status = Status::LOADING;
        info!(
            "Reloading with location {:?}, auth status {:?}",
            self.query.preferred_location, self.query.auth_status
        );
        self.set_status_message("Loading ...");
        self.request_page(1);
    }

    // -------------------- Control handling functions ---------------------- //

    fn selected_index(&self) -> Option<usize> {
        let order = self.table.row_order(&self.rows);
        order.get(self.offset_row + self.curser_row).copied()
    }

    fn toggle_sort(&mut self) {
        let Some(column_id) = self.table.columns().get(self.curser_column).map(|c| c.id) else {
            return;
        };
        let selected = self.selected_index();
        if !self.table.toggle_sort(column_id) {
            self.set_status_message("Column is not sortable");
            return;
        }

        // Keep the cursor on the same account after reordering
        if let Some(idx) = selected {
            let order = self.table.row_order(&self.rows);
            let pos = order.iter().position(|&i| i == idx).unwrap_or(0);
            self.select_row(pos);
        }

        let message = if self.table.sorting().is_empty() {
            "Sorting cleared"
        } else if self.has_more {
            "Sorted the loaded accounts only"
        } else {
            "Sorted"
        };
        self.set_status_message(message);
    }

    fn enter(&mut self) {
        if let Some(idx) = self.selected_index() {
            self.detail_idx = Some(idx);
            self.detail_scroll = 0;
            self.previous_modus = self.modus;
            self.modus = Modus::DETAIL;
            self.build_detail_view();
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::DETAIL => {
                self.previous_modus = Modus::DETAIL;
                self.modus = Modus::TABLE;
                self.detail_idx = None;
                self.popup = None;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                if self.modus == Modus::DETAIL {
                    self.build_detail_view();
                } else {
                    self.popup = None;
                }
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup = Some(Popup::Help(HELP_TEXT.to_string()));
    }

    fn build_detail_view(&mut self) {
        let Some(account) = self.detail_idx.and_then(|idx| self.rows.get(idx)) else {
            return;
        };
        trace!("Building detail view for account {}", account.account_id);
        let empty = AccountDetail::default();
        let detail = self.source.detail(account.account_id).unwrap_or(&empty);

        let sections = detail_sections(account, detail);
        // Section title and a blank line around every section
        let lines: usize = sections.iter().map(|s| s.fields.len() + 2).sum();
        self.detail_scroll = std::cmp::min(self.detail_scroll, lines as u16);
        self.popup = Some(Popup::Detail {
            title: account.holder_name.clone(),
            summary: submission_summary(account, detail),
            sections,
            scroll: self.detail_scroll,
        });
    }

    fn scroll_detail_up(&mut self, lines: u16) {
        self.detail_scroll = self.detail_scroll.saturating_sub(lines);
        self.build_detail_view();
    }

    fn scroll_detail_down(&mut self, lines: u16) {
        self.detail_scroll = self.detail_scroll.saturating_add(lines);
        self.build_detail_view();
    }

    fn previous_record(&mut self) {
        let pos = self.offset_row + self.curser_row;
        if pos > 0 {
            self.select_row(pos - 1);
            self.detail_idx = self.selected_index();
            self.detail_scroll = 0;
            self.build_detail_view();
        }
    }

    fn next_record(&mut self) {
        let pos = self.offset_row + self.curser_row;
        if pos + 1 < self.rows.len() {
            self.select_row(pos + 1);
            self.detail_idx = self.selected_index();
            self.detail_scroll = 0;
            self.build_detail_view();
        }
    }

    // Moves the cursor to display position `pos` and scrolls it into view.
    fn select_row(&mut self, pos: usize) {
        let nrows = self.rows.len();
        if nrows == 0 {
            self.curser_row = 0;
            self.offset_row = 0;
            return;
        }
        let pos = std::cmp::min(pos, nrows - 1);
        let height = self.uilayout.table_height.max(1);
        if pos < self.offset_row {
            self.offset_row = pos;
        } else if pos >= self.offset_row + height {
            self.offset_row = pos + 1 - height;
        }
        self.curser_row = pos - self.offset_row;
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let pos = self.offset_row + self.curser_row;
        self.select_row(pos.saturating_sub(size));
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let pos = self.offset_row + self.curser_row;
        let last = self.rows.len().saturating_sub(1);
        if pos < last {
            self.select_row(pos + size);
        } else if self.has_more && !self.rows.is_empty() {
            // At the last loaded row, scroll far enough to reveal the sentinel.
            // A single line window keeps the cursor row on screen instead.
            let height = self.uilayout.table_height.max(1);
            self.offset_row = std::cmp::min((self.rows.len() + 1).saturating_sub(height), last);
            self.curser_row = last - self.offset_row;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use chrono::{DateTime, Duration as ChronoDuration};

    use super::*;
    use crate::account::{AccountStatus, AuthStatus, DirectorContact, Location};

    fn accounts(n: i64) -> Vec<AccountInfo> {
        let base = DateTime::parse_from_rfc3339("2025-01-01T08:00:00Z").unwrap();
        (1..=n)
            .map(|id| {
                // ids are created in a shuffled order
                let created = base + ChronoDuration::hours((id * 7) % n);
                AccountInfo {
                    account_id: id,
                    created_at: created,
                    updated_at: created,
                    holder_name: format!("Clinic {id:02}"),
                    holder_email: format!("clinic{id}@intake.test"),
                    director: DirectorContact::AccountHolder {
                        name: format!("Dr. {id}"),
                        license: format!("L-{id}"),
                    },
                    auth_status: if id % 2 == 0 {
                        AuthStatus::Approved
                    } else {
                        AuthStatus::Pending
                    },
                    is_account_active: None,
                    account_status: AccountStatus::Active,
                    preferred_location: if id % 3 == 0 {
                        Location::Downtown
                    } else {
                        Location::Leaside
                    },
                }
            })
            .collect()
    }

    fn setup(
        n: i64,
        page_size: usize,
        trigger_offset: u16,
        height: usize,
    ) -> (Model, Receiver<Message>) {
        let (sender, receiver) = mpsc::channel();
        let config = TVConfig {
            page_size,
            trigger_offset,
            ..TVConfig::default()
        };
        let source = Arc::new(IntakeSource::from_accounts("test", accounts(n)));
        // stats, filters, header and status line take four lines
        let model = Model::init(&config, source, sender, 120, height + 4).unwrap();
        (model, receiver)
    }

    // Feeds channel messages into the model until it stays quiet.
    fn drain(model: &mut Model, receiver: &Receiver<Message>) {
        while let Ok(message) = receiver.recv_timeout(std::time::Duration::from_millis(500)) {
            model.update(Some(message)).unwrap();
        }
    }

    #[test]
    fn first_page_loads_on_start() {
        let (mut model, receiver) = setup(30, 10, 0, 5);
        assert_eq!(model.status, Status::LOADING);
        assert!(model.is_fetching());
        assert!(model.get_uidata().table.is_empty());

        drain(&mut model, &receiver);
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.rows().len(), 10);
        assert!(model.has_more());
        assert!(!model.is_fetching());
        assert_eq!(model.get_uidata().total_count, 30);
        assert_eq!(model.get_uidata().table.rows().len(), 5);
    }

    #[test]
    fn sentinel_in_margin_keeps_loading_until_done() {
        let (mut model, receiver) = setup(12, 5, 10, 20);
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 12);
        assert!(!model.has_more());
        assert!(model.get_uidata().table.sentinel().is_none());
        assert!(model.get_uidata().status_message.contains("caught up"));
    }

    #[test]
    fn scrolling_to_the_end_requests_next_page() {
        let (mut model, receiver) = setup(30, 10, 0, 3);
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 10);

        model.update(Some(Message::MoveEnd)).unwrap();
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 10);

        // one more step reveals the sentinel row
        model.update(Some(Message::MoveDown)).unwrap();
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 20);
    }

    #[test]
    fn single_line_window_scrolls_past_last_row() {
        let (mut model, receiver) = setup(30, 10, 0, 1);
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 10);

        model.update(Some(Message::MoveEnd)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.selected_index(), Some(9));
        assert_eq!(model.get_uidata().selected_row, Some(0));
        assert_eq!(model.get_uidata().table.rows().len(), 1);

        // stepping down again at the last row is stable
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.selected_index(), Some(9));
    }

    #[test]
    fn detail_scroll_stops_at_content_end() {
        let (mut model, receiver) = setup(3, 10, 0, 10);
        drain(&mut model, &receiver);
        model.update(Some(Message::Enter)).unwrap();
        for _ in 0..20 {
            model.update(Some(Message::MovePageDown)).unwrap();
        }
        let Some(Popup::Detail {
            sections, scroll, ..
        }) = &model.get_uidata().popup
        else {
            panic!("expected detail popup");
        };
        let lines: usize = sections.iter().map(|s| s.fields.len() + 2).sum();
        assert_eq!(*scroll as usize, lines);

        model.update(Some(Message::MoveBeginning)).unwrap();
        assert!(matches!(
            model.get_uidata().popup,
            Some(Popup::Detail { scroll: 0, .. })
        ));
    }

    #[test]
    fn load_more_ignored_when_exhausted() {
        let (mut model, receiver) = setup(4, 10, 0, 3);
        drain(&mut model, &receiver);
        assert!(!model.has_more());
        model.update(Some(Message::LoadMore)).unwrap();
        assert!(!model.is_fetching());
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 4);
    }

    #[test]
    fn filter_change_reloads_and_drops_stale_pages() {
        let (mut model, receiver) = setup(12, 50, 0, 20);
        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 12);

        model.update(Some(Message::CycleLocation)).unwrap();
        assert!(model.rows().is_empty());
        assert_eq!(model.get_uidata().location, LocationFilter::Leaside);

        let stale = IntakeSource::from_accounts("stale", accounts(3))
            .fetch_page(&QueryParams::default())
            .unwrap();
        model
            .update(Some(Message::PageLoaded {
                generation: 0,
                result: Ok(stale),
            }))
            .unwrap();
        assert!(model.rows().is_empty());

        drain(&mut model, &receiver);
        assert_eq!(model.rows().len(), 8);
        assert!(
            model
                .rows()
                .iter()
                .all(|a| a.preferred_location == Location::Leaside)
        );
    }

    #[test]
    fn fetch_error_stops_loading_and_reports() {
        let (mut model, receiver) = setup(30, 10, 0, 3);
        drain(&mut model, &receiver);
        model.update(Some(Message::Reload)).unwrap();
        drain(&mut model, &receiver);

        model.is_fetching = true;
        let generation = model.generation;
        model
            .update(Some(Message::PageLoaded {
                generation,
                result: Err(IntakeError::InvalidQuery("boom".into())),
            }))
            .unwrap();
        assert!(!model.is_fetching());
        assert!(!model.has_more());
        assert_eq!(model.rows().len(), 10);
        assert!(model.get_uidata().status_message.contains("boom"));
    }

    #[test]
    fn sort_keeps_selected_account() {
        let (mut model, receiver) = setup(6, 10, 0, 10);
        drain(&mut model, &receiver);

        model.update(Some(Message::MoveDown)).unwrap();
        let selected = model.selected_index().unwrap();
        model.update(Some(Message::ToggleSort)).unwrap();
        assert_eq!(
            model.table.sorting().direction_of("createdAt"),
            Some(SortDirection::Ascending)
        );
        assert_eq!(model.selected_index(), Some(selected));

        let uidata = model.get_uidata();
        assert_eq!(uidata.sort_label.as_deref(), Some("Date ascending"));
        let created: Vec<_> = uidata
            .table
            .rows()
            .iter()
            .map(|r| model.rows()[r.index].created_at)
            .collect();
        assert!(created.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(uidata.status_message, "Sorted");

        model.update(Some(Message::ToggleSort)).unwrap();
        model.update(Some(Message::ToggleSort)).unwrap();
        assert!(model.table.sorting().is_empty());
        assert_eq!(model.get_uidata().status_message, "Sorting cleared");
    }

    #[test]
    fn non_sortable_column_reports() {
        let (mut model, receiver) = setup(6, 10, 0, 10);
        drain(&mut model, &receiver);
        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::ToggleSort)).unwrap();
        assert!(model.table.sorting().is_empty());
        assert_eq!(model.get_uidata().status_message, "Column is not sortable");
    }

    #[test]
    fn detail_popup_follows_cursor() {
        let (mut model, receiver) = setup(6, 10, 0, 10);
        drain(&mut model, &receiver);

        model.update(Some(Message::Enter)).unwrap();
        match &model.get_uidata().popup {
            Some(Popup::Detail {
                title,
                summary,
                sections,
                scroll,
            }) => {
                assert_eq!(title, "Clinic 01");
                assert!(summary.ends_with("Auth Pending"), "{summary}");
                assert_eq!(*scroll, 0);
                let director = sections
                    .iter()
                    .find(|s| s.title == "Medical Director Information")
                    .unwrap();
                assert!(director.fields.contains(&(
                    "Medical Director's Email",
                    "clinic1@intake.test (account holder)".to_string()
                )));
            }
            other => panic!("expected detail popup, got {other:?}"),
        }

        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert!(matches!(
            model.get_uidata().popup,
            Some(Popup::Detail { scroll: 2, .. })
        ));
        model.update(Some(Message::MoveUp)).unwrap();
        assert!(matches!(
            model.get_uidata().popup,
            Some(Popup::Detail { scroll: 1, .. })
        ));

        model.update(Some(Message::MoveRight)).unwrap();
        match &model.get_uidata().popup {
            Some(Popup::Detail { title, scroll, .. }) => {
                assert_eq!(title, "Clinic 02");
                assert_eq!(*scroll, 0);
            }
            other => panic!("expected detail popup, got {other:?}"),
        }

        model.update(Some(Message::Help)).unwrap();
        assert!(matches!(model.get_uidata().popup, Some(Popup::Help(_))));
        model.update(Some(Message::Exit)).unwrap();
        assert!(matches!(model.get_uidata().popup, Some(Popup::Detail { .. })));
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.get_uidata().popup.is_none());
    }

    #[test]
    fn quit_from_any_mode() {
        let (mut model, _receiver) = setup(1, 10, 0, 3);
        model.update(Some(Message::Help)).unwrap();
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let (sender, _receiver) = mpsc::channel();
        let config = TVConfig {
            page_size: 0,
            ..TVConfig::default()
        };
        let source = Arc::new(IntakeSource::from_accounts("test", Vec::new()));
        assert!(matches!(
            Model::init(&config, source, sender, 80, 24),
            Err(IntakeError::InvalidQuery(_))
        ));
    }
}
