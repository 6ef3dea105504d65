use std::cmp::min;
use std::path::Path;
use std::time::{Duration, Instant};

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{error, trace};

use crate::domain::{HELP_TEXT, Message, RVConfig, RVError};
use crate::inputter::{InputResult, Inputter};
use crate::report::{BinaryInfo, FUNCTION_COLUMNS, Report, ReportRows};
use crate::sections::SectionList;
use crate::tableview::{RowSource, SortDirection, TableView};
use crate::ui::{CMDLINE_HEIGHT, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Table,
    Sections,
}

#[derive(Debug, Clone, Copy)]
enum Modus {
    Table,
    Sections,
    Popup,
    CmdInput,
}

#[derive(Clone, Debug)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// One rendered line of the sections view. Headers carry the selection
/// highlight and the transient copied-marker.
#[derive(Clone, Debug)]
pub struct SectionLine {
    pub text: String,
    pub is_header: bool,
    pub selected: bool,
    pub flash: bool,
}

// Render state of the functions table: which rows the filter shows, which
// columns fit the width, and where the cursor sits in the window.
struct TableViewport {
    visible: Vec<usize>,
    visible_columns: Vec<usize>,
    cursor_row: usize,
    cursor_column: usize,
    offset_row: usize,
    offset_column: usize,
    data: Vec<ColumnView>,
    height: usize,
    width: usize,
}

impl TableViewport {
    fn empty() -> Self {
        TableViewport {
            visible: Vec::new(),
            visible_columns: Vec::new(),
            cursor_row: 0,
            cursor_column: 0,
            offset_row: 0,
            offset_column: 0,
            data: Vec::new(),
            height: 0,
            width: 0,
        }
    }
}

// The pending revert of the copied-marker. Arming a new flash simply
// replaces this, which cancels the previous deadline.
struct CopyFlash {
    section: usize,
    armed: Instant,
}

pub struct UIData {
    pub name: String,
    pub view: ViewKind,
    pub table: Vec<ColumnView>,
    pub section_lines: Vec<SectionLine>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            view: ViewKind::Table,
            table: Vec::new(),
            section_lines: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT),
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: RVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    binary: Option<BinaryInfo>,
    table: Option<TableView<ReportRows>>,
    column_widths: Vec<usize>,
    viewport: TableViewport,
    sections: SectionList,
    section_offset: usize,
    copy_flash: Option<CopyFlash>,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &RVConfig, ui_width: usize, ui_height: usize) -> Result<Self, RVError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            binary: None,
            table: None,
            column_widths: Vec::new(),
            viewport: TableViewport::empty(),
            sections: SectionList::new(Vec::new()),
            section_offset: 0,
            copy_flash: None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started rv!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_table_data();
        Ok(model)
    }

    pub fn load_report(&mut self, path: &Path) -> Result<(), RVError> {
        let report = Report::load(path)?;
        self.install_report(report);
        Ok(())
    }

    pub fn install_report(&mut self, report: Report) {
        let rows = ReportRows::from_report(&report);
        self.column_widths = rows.column_widths();
        self.table = Some(TableView::new(rows, 0));
        self.sections = SectionList::from_report(&report);
        self.viewport = TableViewport::empty();
        self.section_offset = 0;
        self.copy_flash = None;
        let name = report.binary.file_name.clone();
        let count = report.functions.len();
        self.binary = Some(report.binary);
        self.set_status_message(format!("Loaded {count} functions from \"{name}\""));
        self.update_table_data();
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), RVError> {
        self.tick();

        if let Some(msg) = message {
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => {
                        self.move_table_selection_up(self.uilayout.table_height.max(1))
                    }
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height.max(1))
                    }
                    Message::MoveTop => self.move_table_selection_top(),
                    Message::MoveBottom => self.move_table_selection_bottom(),
                    Message::SortColumn => self.sort_current_column(),
                    Message::SwitchView => self.switch_view(ViewKind::Sections),
                    Message::Filter => self.enter_query_mode(),
                    Message::Enter => self.open_selected_section(),
                    Message::Copy => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Sections => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_section_selection_down(1),
                    Message::MoveUp => self.move_section_selection_up(1),
                    Message::MovePageUp => {
                        self.move_section_selection_up(self.uilayout.table_height.max(1))
                    }
                    Message::MovePageDown => {
                        self.move_section_selection_down(self.uilayout.table_height.max(1))
                    }
                    Message::MoveTop => self.move_section_selection_top(),
                    Message::MoveBottom => self.move_section_selection_bottom(),
                    Message::SwitchView => self.switch_view(ViewKind::Table),
                    Message::Filter => self.enter_query_mode(),
                    Message::Enter => self.toggle_selected_section(),
                    Message::Copy => self.copy_section_code(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.switch_view(ViewKind::Table),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::Popup => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CmdInput => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        Ok(())
    }

    // The idle tick. Reverts the copied-marker once its deadline passed.
    fn tick(&mut self) {
        if let Some(flash) = &self.copy_flash {
            if flash.armed.elapsed() >= Duration::from_millis(self.config.copy_flash_time) {
                trace!("Copy flash expired");
                self.copy_flash = None;
                if matches!(self.modus, Modus::Sections) {
                    self.update_section_data();
                }
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::Popup;
        self.uidata.show_popup = false;
    }

    fn switch_view(&mut self, target: ViewKind) {
        self.previous_modus = self.modus;
        match target {
            ViewKind::Table => {
                self.modus = Modus::Table;
                self.update_table_data();
            }
            ViewKind::Sections => {
                self.modus = Modus::Sections;
                self.update_section_data();
            }
        }
    }

    fn enter_query_mode(&mut self) {
        trace!("Entering query input ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();
        self.update_cmdline_data();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_query_input();
        }
        self.update_cmdline_data();
    }

    fn handle_query_input(&mut self) {
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;
        if !self.last_input.canceled {
            let query = self.last_input.input.clone();
            self.apply_query(&query);
        }
    }

    /// One query drives both the functions table and the section list,
    /// they share the single search input.
    pub fn apply_query(&mut self, query: &str) {
        if let Some(table) = self.table.as_mut() {
            table.filter(query);
        }
        self.sections.filter(query);
        self.viewport.offset_row = 0;
        self.viewport.cursor_row = 0;
        self.section_offset = 0;

        let shown = self
            .table
            .as_ref()
            .map(|t| t.visible_rows().len())
            .unwrap_or(0);
        if query.is_empty() {
            self.set_status_message("Cleared filter".to_string());
        } else {
            self.set_status_message(format!("Filter \"{query}\" matches {shown} functions"));
        }
        self.update_view_data();
    }

    fn sort_current_column(&mut self) {
        let column = self.viewport.offset_column + self.viewport.cursor_column;
        if column >= FUNCTION_COLUMNS.len() {
            return;
        }
        let Some(table) = self.table.as_mut() else {
            return;
        };
        let meta = &FUNCTION_COLUMNS[column];
        let direction = table.sort(column, meta.kind);
        self.set_status_message(format!("Sorted by {} ({})", meta.name, direction.label()));
        self.update_table_data();
    }

    fn open_selected_section(&mut self) {
        let Some(label) = self.selected_function() else {
            return;
        };
        match self.sections.position_of_label(&label) {
            Some(idx) => {
                self.sections.set_cursor(idx);
                self.sections.expand(idx);
                self.previous_modus = self.modus;
                self.modus = Modus::Sections;
                self.update_section_data();
            }
            None => {
                error!("No section for function \"{}\"", label);
                self.set_status_message(format!("No section for \"{label}\""));
            }
        }
    }

    fn toggle_selected_section(&mut self) {
        let idx = self.sections.cursor();
        if self.sections.toggle(idx).is_some() {
            self.update_section_data();
        }
    }

    // -------------------- Clipboard ---------------------- //

    fn clipboard_write(&mut self, content: String) -> Result<(), arboard::Error> {
        if self.clipboard.is_none() {
            self.clipboard = match Clipboard::new() {
                Ok(clipboard) => Some(clipboard),
                Err(e) => {
                    trace!("Opening the clipboard failed: {:?}", e);
                    None
                }
            };
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(content),
            None => Err(arboard::Error::ClipboardNotSupported),
        }
    }

    fn copy_section_code(&mut self) {
        let idx = self.sections.cursor();
        let Some(section) = self.sections.get(idx) else {
            return;
        };
        let label = section.label.clone();
        let Some(code) = section.body.clone() else {
            // Missing copy target: report it, write nothing, arm nothing.
            error!("No code block for function \"{}\"", label);
            self.set_status_message(format!("No code block for \"{label}\""));
            return;
        };

        match self.clipboard_write(code) {
            Ok(_) => {
                trace!("Copied code block of \"{}\" to clipboard.", label);
                // A fresh copy replaces any pending revert deadline.
                self.copy_flash = Some(CopyFlash {
                    section: idx,
                    armed: Instant::now(),
                });
                self.set_status_message(format!("Copied \"{label}\" to clipboard"));
            }
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard unavailable".to_string());
            }
        }
        self.update_section_data();
    }

    fn copy_table_cell(&mut self) {
        let Some(cell) = self.selected_cell() else {
            return;
        };
        trace!("Cell content: {}", cell);
        match self.clipboard_write(cell) {
            Ok(_) => self.set_status_message("Copied cell to clipboard".to_string()),
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard unavailable".to_string());
            }
        }
    }

    fn copy_table_row(&mut self) {
        let Some(table) = self.table.as_ref() else {
            return;
        };
        let vp = &self.viewport;
        let Some(&row) = vp.visible.get(vp.offset_row + vp.cursor_row) else {
            return;
        };
        let content = (0..table.source().column_count())
            .map(|cidx| Self::wrap_cell_content(table.source().cell(row, cidx).unwrap_or("")))
            .collect::<Vec<String>>();
        let row_content = content.join(",");

        match self.clipboard_write(row_content) {
            Ok(_) => self.set_status_message("Copied row to clipboard".to_string()),
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard unavailable".to_string());
            }
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    // -------------------- Table selection ---------------------- //

    fn selected_function(&self) -> Option<String> {
        let table = self.table.as_ref()?;
        let vp = &self.viewport;
        let row = *vp.visible.get(vp.offset_row + vp.cursor_row)?;
        table.source().cell(row, 0).map(|s| s.to_string())
    }

    fn selected_cell(&self) -> Option<String> {
        let table = self.table.as_ref()?;
        let vp = &self.viewport;
        let row = *vp.visible.get(vp.offset_row + vp.cursor_row)?;
        let column = *vp.visible_columns.get(vp.cursor_column)?;
        table.source().cell(row, column).map(|s| s.to_string())
    }

    fn place_table_cursor(&mut self, target: usize) {
        let height = self.uilayout.table_height.max(1);
        let vp = &mut self.viewport;
        if target < vp.offset_row {
            vp.offset_row = target;
        } else if target >= vp.offset_row + height {
            vp.offset_row = target + 1 - height;
        }
        vp.cursor_row = target - vp.offset_row;
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let total = self.viewport.visible.len();
        if total == 0 {
            return;
        }
        let current = self.viewport.offset_row + self.viewport.cursor_row;
        self.place_table_cursor(min(current + size, total - 1));
    }

    fn move_table_selection_up(&mut self, size: usize) {
        if self.viewport.visible.is_empty() {
            return;
        }
        let current = self.viewport.offset_row + self.viewport.cursor_row;
        self.place_table_cursor(current.saturating_sub(size));
    }

    fn move_table_selection_top(&mut self) {
        if !self.viewport.visible.is_empty() {
            self.place_table_cursor(0);
        }
    }

    fn move_table_selection_bottom(&mut self) {
        let total = self.viewport.visible.len();
        if total > 0 {
            self.place_table_cursor(total - 1);
        }
    }

    fn move_table_selection_left(&mut self) {
        let vp = &mut self.viewport;
        if vp.cursor_column > 0 {
            vp.cursor_column -= 1;
        } else if vp.offset_column > 0 {
            vp.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let vp = &mut self.viewport;
        if vp.cursor_column + 1 < vp.visible_columns.len() {
            vp.cursor_column += 1;
        } else if vp.offset_column + vp.visible_columns.len() < FUNCTION_COLUMNS.len() {
            vp.offset_column += 1;
        }
        self.update_table_data();
    }

    // -------------------- Section selection ---------------------- //

    fn move_section_selection_down(&mut self, size: usize) {
        self.sections.cursor_down(size);
        self.update_section_data();
    }

    fn move_section_selection_up(&mut self, size: usize) {
        self.sections.cursor_up(size);
        self.update_section_data();
    }

    fn move_section_selection_top(&mut self) {
        self.sections.cursor_top();
        self.update_section_data();
    }

    fn move_section_selection_bottom(&mut self) {
        self.sections.cursor_bottom();
        self.update_section_data();
    }

    // -------------------- UI data ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.update_view_data();
    }

    fn update_view_data(&mut self) {
        match self.modus {
            Modus::Table => self.update_table_data(),
            Modus::Sections => self.update_section_data(),
            Modus::Popup => {}
            Modus::CmdInput => {}
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    fn update_cmdline_data(&mut self) {
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
    }

    fn update_table_data(&mut self) {
        let Some(table) = self.table.as_ref() else {
            self.uidata = UIData::empty();
            self.uidata.layout = self.uilayout.clone();
            self.uidata.status_message = self.status_message.clone();
            return;
        };

        let max_column_width = self.config.max_column_width;
        let vp = &mut self.viewport;
        vp.visible = table.visible_rows();
        vp.width = self.uilayout.table_width;
        vp.height = self.uilayout.table_height;

        // Clamp the cursor into the visible set
        let total = vp.visible.len();
        if total == 0 {
            vp.offset_row = 0;
            vp.cursor_row = 0;
        } else {
            if vp.offset_row >= total {
                vp.offset_row = total - 1;
            }
            let window = min(vp.height.max(1), total - vp.offset_row);
            vp.cursor_row = min(vp.cursor_row, window.saturating_sub(1));
        }

        let rbegin = vp.offset_row;
        let rend = min(rbegin + vp.height.max(1), total);

        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, tw: {}, th: {}",
            vp.cursor_row,
            vp.cursor_column,
            vp.offset_row,
            vp.offset_column,
            rbegin,
            rend,
            vp.width,
            vp.height
        );

        // Which columns fit the width budget, starting at the offset
        let render_widths: Vec<usize> = self
            .column_widths
            .iter()
            .map(|w| min(w + COLUMN_WIDTH_MARGIN, max_column_width))
            .collect();

        vp.visible_columns = Vec::new();
        let mut visible_width = 0;
        for cidx in vp.offset_column..render_widths.len() {
            if visible_width + render_widths[cidx] + 1 <= vp.width {
                vp.visible_columns.push(cidx);
                visible_width += render_widths[cidx] + 1;
            } else {
                // Add the last partially visible column
                if visible_width < vp.width {
                    vp.visible_columns.push(cidx);
                }
                break;
            }
        }
        if vp.visible_columns.is_empty() && vp.offset_column < render_widths.len() {
            vp.visible_columns.push(vp.offset_column);
        }
        vp.cursor_column = min(
            vp.cursor_column,
            vp.visible_columns.len().saturating_sub(1),
        );

        // Build the per column views for the visible window
        vp.data.clear();
        for &cidx in vp.visible_columns.iter() {
            let width = render_widths[cidx];
            let mut name = Self::get_visible_name(FUNCTION_COLUMNS[cidx].name, width);
            match table.direction(cidx) {
                Some(SortDirection::Ascending) => name.push_str(" ▲"),
                Some(SortDirection::Descending) => name.push_str(" ▼"),
                None => {}
            }
            let data = vp.visible[rbegin..rend]
                .iter()
                .map(|&row| table.source().cell(row, cidx).unwrap_or("").to_string())
                .collect();
            vp.data.push(ColumnView { name, width, data });
        }

        self.update_uidata_for_table();
    }

    fn update_uidata_for_table(&mut self) {
        let vp = &self.viewport;
        self.uidata = UIData {
            name: self
                .binary
                .as_ref()
                .map(|b| b.file_name.clone())
                .unwrap_or_default(),
            view: ViewKind::Table,
            table: vp.data.clone(),
            section_lines: Vec::new(),
            nrows: vp.visible.len(),
            selected_row: vp.cursor_row,
            selected_column: vp.cursor_column,
            abs_selected_row: vp.offset_row + vp.cursor_row,
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn update_section_data(&mut self) {
        let height = self.uilayout.table_height.max(1);
        let flash_idx = self.copy_flash.as_ref().map(|f| f.section);

        // Expand the visible sections into render lines and remember on
        // which line the cursor's header sits.
        let mut lines: Vec<SectionLine> = Vec::new();
        let mut cursor_line = 0;
        for idx in self.sections.visible_indices() {
            let section = self.sections.get(idx).unwrap();
            let selected = idx == self.sections.cursor();
            if selected {
                cursor_line = lines.len();
            }
            let marker = if section.is_expanded() { "▾" } else { "▸" };
            lines.push(SectionLine {
                text: format!("{} {}", marker, section.label),
                is_header: true,
                selected,
                flash: flash_idx == Some(idx),
            });
            if section.is_expanded() {
                match &section.body {
                    Some(body) => {
                        for line in body.lines() {
                            lines.push(SectionLine {
                                text: format!("    {line}"),
                                is_header: false,
                                selected: false,
                                flash: false,
                            });
                        }
                    }
                    None => lines.push(SectionLine {
                        text: "    (no code block)".to_string(),
                        is_header: false,
                        selected: false,
                        flash: false,
                    }),
                }
            }
        }

        // Scroll the window so the selected header stays on screen
        if cursor_line < self.section_offset {
            self.section_offset = cursor_line;
        }
        if cursor_line >= self.section_offset + height {
            self.section_offset = cursor_line + 1 - height;
        }
        if self.section_offset >= lines.len() {
            self.section_offset = lines.len().saturating_sub(1);
        }
        let wbegin = self.section_offset;
        let wend = min(wbegin + height, lines.len());

        self.uidata = UIData {
            name: format!(
                "S[{}]",
                self.binary
                    .as_ref()
                    .map(|b| b.file_name.as_str())
                    .unwrap_or("")
            ),
            view: ViewKind::Sections,
            table: Vec::new(),
            section_lines: lines[wbegin..wend].to_vec(),
            nrows: lines.len(),
            selected_row: cursor_line.saturating_sub(wbegin),
            selected_column: 0,
            abs_selected_row: cursor_line,
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        let mut reduced = name.to_string();
        if reduced.len() > width {
            reduced = reduced[0..width - 3].to_string();
            reduced.push_str("...");
        }
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FunctionRecord;
    use ratatui::crossterm::event::KeyCode;

    fn demo_report() -> Report {
        let functions = vec![
            function("main", 0x401000, 0x401090, 1, 3, true),
            function("parse_header_line", 0x401090, 0x401140, 4, 7, true),
            function("emit_summary", 0x401140, 0x401190, 2, 1, true),
            function("_fini", 0x401190, 0x40119c, 0, 0, false),
        ];
        Report {
            binary: BinaryInfo {
                file_name: "demo.elf".to_string(),
                file_type: "Executable".to_string(),
                arch: "x86_64".to_string(),
                file_size: 18432,
                stripped: false,
                language: "C".to_string(),
                entry_point: 0x401000,
            },
            functions,
        }
    }

    fn function(
        name: &str,
        start: u64,
        end: u64,
        calls: usize,
        jumps: usize,
        with_code: bool,
    ) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            start_addr: start,
            end_addr: end,
            invocation_entry: calls,
            jmp: jumps,
            disassembly: with_code.then(|| format!("{start:x}: push rbp\n{start:x}: ret")),
        }
    }

    fn demo_model() -> Model {
        let mut model = Model::init(&RVConfig::default(), 120, 30).unwrap();
        model.install_report(demo_report());
        model
    }

    fn first_column(model: &Model) -> Vec<String> {
        let table = model.table.as_ref().unwrap();
        (0..table.source().len())
            .map(|row| table.source().cell(row, 0).unwrap().to_string())
            .collect()
    }

    fn type_query(model: &mut Model, query: &str) {
        model.update(Some(Message::Filter)).unwrap();
        for c in query.chars() {
            model
                .update(Some(Message::RawKey(KeyCode::Char(c).into())))
                .unwrap();
        }
        model
            .update(Some(Message::RawKey(KeyCode::Enter.into())))
            .unwrap();
    }

    #[test]
    fn install_builds_table_and_sections() {
        let model = demo_model();
        assert_eq!(model.uidata.view, ViewKind::Table);
        assert_eq!(model.uidata.nrows, 4);
        assert_eq!(model.sections.len(), 4);
        assert!(model.uidata.status_message.contains("4 functions"));
    }

    #[test]
    fn sort_message_toggles_direction() {
        let mut model = demo_model();
        model.update(Some(Message::SortColumn)).unwrap();
        let ascending = first_column(&model);
        assert_eq!(ascending[0], "_fini");
        model.update(Some(Message::SortColumn)).unwrap();
        let descending = first_column(&model);
        let reversed: Vec<String> = ascending.into_iter().rev().collect();
        assert_eq!(descending, reversed);
    }

    #[test]
    fn query_filters_table_and_sections_together() {
        let mut model = demo_model();
        type_query(&mut model, "main");
        assert_eq!(model.uidata.nrows, 1);
        assert_eq!(model.sections.visible_indices(), vec![0]);
        assert!(model.uidata.status_message.contains("matches 1 functions"));

        type_query(&mut model, "");
        assert_eq!(model.uidata.nrows, 4);
        assert_eq!(model.sections.visible_indices().len(), 4);
    }

    #[test]
    fn canceled_query_changes_nothing() {
        let mut model = demo_model();
        model.update(Some(Message::Filter)).unwrap();
        model
            .update(Some(Message::RawKey(KeyCode::Char('x').into())))
            .unwrap();
        model
            .update(Some(Message::RawKey(KeyCode::Esc.into())))
            .unwrap();
        assert_eq!(model.uidata.nrows, 4);
        assert!(!model.raw_keyevents());
    }

    #[test]
    fn enter_opens_the_matching_section_expanded() {
        let mut model = demo_model();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.uidata.view, ViewKind::Sections);
        let idx = model.sections.cursor();
        assert_eq!(model.sections.get(idx).unwrap().label, "parse_header_line");
        assert!(model.sections.get(idx).unwrap().is_expanded());
    }

    #[test]
    fn copy_on_missing_code_block_arms_no_flash() {
        let mut model = demo_model();
        model.update(Some(Message::SwitchView)).unwrap();
        model.sections.set_cursor(3); // _fini has no disassembly
        model.update(Some(Message::Copy)).unwrap();
        assert!(model.copy_flash.is_none());
        assert!(model.uidata.status_message.contains("No code block"));
    }

    #[test]
    fn flash_reverts_after_the_deadline() {
        let mut model = demo_model();
        model.update(Some(Message::SwitchView)).unwrap();
        model.copy_flash = Some(CopyFlash {
            section: 0,
            armed: Instant::now() - Duration::from_millis(2500),
        });
        model.update(None).unwrap();
        assert!(model.copy_flash.is_none());
    }

    #[test]
    fn rearming_replaces_the_pending_flash() {
        let mut model = demo_model();
        model.copy_flash = Some(CopyFlash {
            section: 0,
            armed: Instant::now() - Duration::from_millis(1900),
        });
        // A new copy on another section replaces the nearly expired flash.
        model.copy_flash = Some(CopyFlash {
            section: 2,
            armed: Instant::now(),
        });
        model.update(None).unwrap();
        let flash = model.copy_flash.as_ref().unwrap();
        assert_eq!(flash.section, 2);
    }

    #[test]
    fn toggle_section_twice_is_a_roundtrip() {
        let mut model = demo_model();
        model.update(Some(Message::SwitchView)).unwrap();
        assert!(!model.sections.get(0).unwrap().is_expanded());
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.sections.get(0).unwrap().is_expanded());
        model.update(Some(Message::Enter)).unwrap();
        assert!(!model.sections.get(0).unwrap().is_expanded());
    }

    #[test]
    fn top_and_bottom_jumps() {
        let mut model = demo_model();
        model.update(Some(Message::MoveBottom)).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 3);
        model.update(Some(Message::MoveTop)).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 0);
    }

    #[test]
    fn filter_after_sort_keeps_sorted_order() {
        let mut model = demo_model();
        model.update(Some(Message::SortColumn)).unwrap();
        type_query(&mut model, "e");
        // Of the sorted order (_fini, emit_summary, main, parse_header_line)
        // only the rows containing an "e" remain, order preserved.
        let table = model.table.as_ref().unwrap();
        let shown: Vec<&str> = table
            .visible_rows()
            .into_iter()
            .map(|row| table.source().cell(row, 0).unwrap())
            .collect();
        assert_eq!(shown, vec!["emit_summary", "parse_header_line"]);
    }

    #[test]
    fn resize_recomputes_the_layout() {
        let mut model = demo_model();
        model.update(Some(Message::Resize(60, 20))).unwrap();
        assert_eq!(model.uidata.layout.width, 60);
        assert_eq!(
            model.uidata.layout.table_height,
            20 - CMDLINE_HEIGHT - TABLE_HEADER_HEIGHT
        );
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = demo_model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.uidata.show_popup);
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.uidata.show_popup);
    }

    #[test]
    fn quit_message_sets_quitting() {
        let mut model = demo_model();
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::Quitting);
    }
}
