use std::mem;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use crossterm::event::KeyCode;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Wrap,
};
use ratatui::Frame;

use crate::config::Settings;
use crate::db::{RecordRepository, SqliteDirectory};
use crate::models::{Record, RecordField};
use crate::notices::{save_notice, NoticeKind};
use crate::transfer::save_search_results;

use super::forms::{NoticeForm, PathPrompt, PathPurpose, RecordForm, SearchForm};
use super::helpers::{centered_rect, plural, surface_error};
use super::registry::{Dialog, DialogRegistry};
use super::screens::{ActiveSearch, DirectoryScreen, DuplicatesScreen};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Space under the table for the selected record's details.
const DETAIL_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown.
const PAGE_STEP: isize = 10;

const EXPORT_FILE_NAME: &str = "directory.csv";
const SEARCH_RESULTS_FILE_NAME: &str = "search-results.csv";

/// High-level navigation states.
enum Screen {
    Directory,
    Duplicates(DuplicatesScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingRecord(RecordForm),
    EditingRecord { id: i64, form: RecordForm },
    ConfirmContinueAdding,
    ConfirmRecordDelete(Record),
    Searching(SearchForm),
    PromptingPath(PathPrompt),
    ConfirmReset(usize),
    ConfirmDuplicateRemoval(Vec<i64>),
    WritingNotice(NoticeForm),
}

impl Mode {
    /// Logical dialog this mode keeps open, if any.
    fn dialog(&self) -> Option<Dialog> {
        match self {
            Mode::Normal => None,
            Mode::AddingRecord(_) | Mode::EditingRecord { .. } => Some(Dialog::RecordForm),
            Mode::Searching(_) => Some(Dialog::Search),
            Mode::PromptingPath(_) => Some(Dialog::FilePrompt),
            Mode::ConfirmContinueAdding
            | Mode::ConfirmRecordDelete(_)
            | Mode::ConfirmReset(_)
            | Mode::ConfirmDuplicateRemoval(_) => Some(Dialog::Confirm),
            Mode::WritingNotice(form) => Some(Dialog::Notice(form.notice.kind())),
        }
    }
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    repo: SqliteDirectory,
    settings: Settings,
    directory: DirectoryScreen,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    dialogs: DialogRegistry,
}

impl App {
    pub fn new(repo: SqliteDirectory, settings: Settings) -> Result<Self> {
        let records = repo.list_all()?;
        Ok(Self {
            repo,
            settings,
            directory: DirectoryScreen::new(records),
            screen: Screen::Directory,
            mode: Mode::Normal,
            status: None,
            dialogs: DialogRegistry::default(),
        })
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        let previous = mode.dialog();

        let next = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::AddingRecord(form) => self.handle_add_record(code, form),
            Mode::EditingRecord { id, form } => self.handle_edit_record(code, id, form),
            Mode::ConfirmContinueAdding => Ok(self.handle_confirm_continue(code)),
            Mode::ConfirmRecordDelete(record) => self.handle_confirm_delete(code, record),
            Mode::Searching(form) => self.handle_search(code, form),
            Mode::PromptingPath(prompt) => self.handle_path_prompt(code, prompt),
            Mode::ConfirmReset(count) => self.handle_confirm_reset(code, count),
            Mode::ConfirmDuplicateRemoval(ids) => self.handle_confirm_duplicates(code, ids),
            Mode::WritingNotice(form) => Ok(self.handle_notice(code, form)),
        };
        let mode = match next {
            Ok(mode) => mode,
            Err(err) => {
                if let Some(dialog) = previous {
                    self.dialogs.close(dialog);
                }
                return Err(err);
            }
        };

        if let Some(dialog) = previous.filter(|d| mode.dialog() != Some(*d)) {
            self.dialogs.close(dialog);
        }
        self.mode = mode;
        Ok(exit)
    }

    /// Enter `mode` unless its dialog is already open.
    fn open(&mut self, mode: Mode) -> Mode {
        match mode.dialog() {
            Some(dialog) if !self.dialogs.try_open(dialog) => {
                self.set_status(
                    format!("{} is already open.", dialog.title()),
                    StatusKind::Error,
                );
                Mode::Normal
            }
            _ => mode,
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        if matches!(self.screen, Screen::Duplicates(_)) {
            return self.handle_duplicates_key(code, exit);
        }

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if self.directory.search.is_some() {
                    self.show_all();
                } else {
                    *exit = true;
                }
            }
            KeyCode::Up => self.directory.move_selection(-1),
            KeyCode::Down => self.directory.move_selection(1),
            KeyCode::PageUp => self.directory.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.directory.move_selection(PAGE_STEP),
            KeyCode::Home => self.directory.select_first(),
            KeyCode::End => self.directory.select_last(),
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(self.open(Mode::AddingRecord(self.blank_form())));
            }
            KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::F(2) => {
                match self.directory.current_record().cloned() {
                    Some(record) => {
                        if let Some(id) = record.id {
                            self.clear_status();
                            let form = RecordForm::from_record(
                                &record,
                                &self.settings.landline_mask,
                                &self.settings.cell_mask,
                            );
                            return Ok(self.open(Mode::EditingRecord { id, form }));
                        }
                    }
                    None => self.set_status("No record selected to edit.", StatusKind::Error),
                }
            }
            KeyCode::Char('-') | KeyCode::Delete => match self.directory.current_record().cloned() {
                Some(record) => {
                    self.clear_status();
                    return Ok(self.open(Mode::ConfirmRecordDelete(record)));
                }
                None => self.set_status("No record selected to delete.", StatusKind::Error),
            },
            KeyCode::Char('f') | KeyCode::Char('F') => {
                self.clear_status();
                return Ok(self.open(Mode::Searching(SearchForm::default())));
            }
            KeyCode::F(5) => {
                if self.show_all() {
                    self.set_status(
                        format!("Showing all {}.", plural(self.directory.records.len(), "record")),
                        StatusKind::Info,
                    );
                }
            }
            KeyCode::Char('d') | KeyCode::Char('D') => self.open_duplicates(),
            KeyCode::Char('i') | KeyCode::Char('I') => {
                return Ok(self.open_path_prompt(PathPurpose::Import));
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                return Ok(self.open_path_prompt(PathPurpose::Export));
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                if self.directory.records.is_empty() {
                    self.set_status("There are no results to save.", StatusKind::Error);
                } else {
                    return Ok(self.open_path_prompt(PathPurpose::SaveResults));
                }
            }
            KeyCode::Char('R') => return self.request_reset(),
            KeyCode::Char('t') | KeyCode::Char('T') => {
                return Ok(self.open_notice(NoticeKind::TransportCancellation));
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                return Ok(self.open_notice(NoticeKind::MedicalDischarge));
            }
            KeyCode::Char('g') | KeyCode::Char('G') => {
                return Ok(self.open_notice(NoticeKind::GeneralMessage));
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_duplicates_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Duplicates(duplicates) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.close_duplicates();
                self.clear_status();
            }
            KeyCode::Up => duplicates.move_selection(-1),
            KeyCode::Down => duplicates.move_selection(1),
            KeyCode::PageUp => duplicates.move_selection(-PAGE_STEP),
            KeyCode::PageDown => duplicates.move_selection(PAGE_STEP),
            KeyCode::Home => duplicates.select_first(),
            KeyCode::End => duplicates.select_last(),
            KeyCode::Char(' ') => duplicates.toggle_current(),
            KeyCode::Enter => {
                let ids = duplicates.marked_ids();
                if ids.is_empty() {
                    self.set_status(
                        "Mark the records to remove with Space first.",
                        StatusKind::Error,
                    );
                } else {
                    return Ok(self.open(Mode::ConfirmDuplicateRemoval(ids)));
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add_record(&mut self, code: KeyCode, mut form: RecordForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Add record cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_record(&mut form) {
                Ok(()) => return Ok(self.open(Mode::ConfirmContinueAdding)),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::AddingRecord(form))
    }

    fn handle_edit_record(&mut self, code: KeyCode, id: i64, mut form: RecordForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_record(id, &mut form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::EditingRecord { id, form })
    }

    fn handle_confirm_continue(&mut self, code: KeyCode) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.open(Mode::AddingRecord(self.blank_form()))
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => Mode::Normal,
            _ => Mode::ConfirmContinueAdding,
        }
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, record: Record) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                let Some(id) = record.id else {
                    return Ok(Mode::Normal);
                };
                match self.repo.delete(id) {
                    Ok(()) => self.set_status(format!("Deleted {record}."), StatusKind::Info),
                    Err(err) => self.set_status(err.to_string(), StatusKind::Error),
                }
                self.reload_directory(None);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmRecordDelete(record)),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut form: SearchForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.clear_status();
                return Ok(Mode::Normal);
            }
            KeyCode::Tab => form.field = form.field.next(),
            KeyCode::BackTab => form.field = form.field.previous(),
            KeyCode::Backspace => {
                form.keyword.pop();
            }
            KeyCode::Enter => {
                if form.keyword.trim().is_empty() {
                    self.set_status("Type a keyword to search.", StatusKind::Error);
                    return Ok(Mode::Searching(form));
                }

                let results = match self.repo.search(form.field.column(), &form.keyword) {
                    Ok(results) => results,
                    Err(err) => {
                        self.set_status(err.to_string(), StatusKind::Error);
                        return Ok(Mode::Searching(form));
                    }
                };

                if results.is_empty() {
                    self.set_status(
                        format!(
                            "No records with \"{}\" in {}.",
                            form.keyword,
                            form.field.label()
                        ),
                        StatusKind::Error,
                    );
                    return Ok(Mode::Searching(form));
                }

                self.set_status(
                    format!("Found {}.", plural(results.len(), "record")),
                    StatusKind::Info,
                );
                self.directory.set_records(results, None);
                self.directory.select_first();
                self.directory.search = Some(ActiveSearch {
                    field: form.field,
                    keyword: form.keyword,
                });
                return Ok(Mode::Normal);
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    form.keyword.push(ch);
                }
            }
            _ => {}
        }
        Ok(Mode::Searching(form))
    }

    fn handle_path_prompt(&mut self, code: KeyCode, mut prompt: PathPrompt) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} cancelled.", prompt.purpose.title()), StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Enter => {
                let Some(path) = prompt.path() else {
                    self.set_status("Type a file path.", StatusKind::Error);
                    return Ok(Mode::PromptingPath(prompt));
                };
                match self.run_file_action(prompt.purpose, path) {
                    Ok(message) => {
                        self.set_status(message, StatusKind::Info);
                        return Ok(Mode::Normal);
                    }
                    Err(err) => self.set_status(err.to_string(), StatusKind::Error),
                }
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    prompt.input.push(ch);
                }
            }
            _ => {}
        }
        Ok(Mode::PromptingPath(prompt))
    }

    fn handle_confirm_reset(&mut self, code: KeyCode, count: usize) -> Result<Mode> {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.repo.reset() {
                    Ok(deleted) => self.set_status(
                        format!("Directory cleared; {} removed.", plural(deleted, "record")),
                        StatusKind::Info,
                    ),
                    Err(err) => self.set_status(err.to_string(), StatusKind::Error),
                }
                self.directory.search = None;
                self.reload_directory(None);
                Ok(Mode::Normal)
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Reset cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmReset(count)),
        }
    }

    fn handle_confirm_duplicates(&mut self, code: KeyCode, ids: Vec<i64>) -> Result<Mode> {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.remove_duplicates(&ids);
                Ok(Mode::Normal)
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Nothing removed.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmDuplicateRemoval(ids)),
        }
    }

    fn handle_notice(&mut self, code: KeyCode, mut form: NoticeForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status(format!("{} discarded.", form.title()), StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                let saved = self.settings.notices_dir().and_then(|dir| {
                    save_notice(&dir, &form.formatted(), Local::now().naive_local())
                });
                match saved {
                    Ok(path) => {
                        self.set_status(
                            format!("Notice saved to {}.", path.display()),
                            StatusKind::Info,
                        );
                        return Mode::Normal;
                    }
                    Err(err) => {
                        let message = err.to_string();
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::WritingNotice(form)
    }

    /// Ctrl+O: compose an email to the selected record.
    pub(crate) fn handle_ctrl_o(&mut self) -> Result<()> {
        if !matches!(self.mode, Mode::Normal) {
            return Ok(());
        }

        let record = match &self.screen {
            Screen::Directory => self.directory.current_record(),
            Screen::Duplicates(duplicates) => duplicates.records().get(duplicates.selected),
        };
        let Some(email) = record.map(|r| r.email.trim().to_string()) else {
            self.set_status("No record selected.", StatusKind::Error);
            return Ok(());
        };

        if email.is_empty() {
            self.set_status("This record has no email address.", StatusKind::Error);
        } else if let Err(err) = open_link(format!("mailto:{email}")) {
            self.set_status(format!("Failed to open mail client: {err}"), StatusKind::Error);
        } else {
            self.set_status(format!("Composing email to {email}."), StatusKind::Info);
        }
        Ok(())
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Directory => self.draw_directory(frame, content_area),
            Screen::Duplicates(duplicates) => self.draw_duplicates(frame, content_area, duplicates),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingRecord(form) => self.draw_record_form(frame, area, "Add Record", form),
            Mode::EditingRecord { form, .. } => {
                self.draw_record_form(frame, area, "Edit Record", form)
            }
            Mode::ConfirmContinueAdding => self.draw_confirm(
                frame,
                area,
                "Record Added",
                vec![Line::from("Add another record?")],
            ),
            Mode::ConfirmRecordDelete(record) => self.draw_confirm(
                frame,
                area,
                "Confirm Removal",
                vec![
                    Line::from(format!("Delete {record}?")),
                    Line::from(record.summary_line()),
                ],
            ),
            Mode::ConfirmReset(count) => self.draw_confirm(
                frame,
                area,
                "Clear Directory",
                vec![
                    Line::from(format!(
                        "Remove all {} from the directory?",
                        plural(*count, "record")
                    )),
                    Line::from("This cannot be undone."),
                ],
            ),
            Mode::ConfirmDuplicateRemoval(ids) => self.draw_confirm(
                frame,
                area,
                "Remove Duplicates",
                vec![Line::from(format!(
                    "Remove {} marked as duplicate?",
                    plural(ids.len(), "record")
                ))],
            ),
            Mode::Searching(form) => self.draw_search_bar(frame, area, form),
            Mode::PromptingPath(prompt) => self.draw_path_prompt(frame, area, prompt),
            Mode::WritingNotice(form) => self.draw_notice_form(frame, area, form),
            Mode::Normal => {}
        }
    }

    fn draw_directory(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(DETAIL_HEIGHT)])
            .split(area);

        let title = match &self.directory.search {
            Some(search) => format!(
                "Directory - {} containing \"{}\" ({})",
                search.field.label(),
                search.keyword,
                self.directory.records.len()
            ),
            None => format!("Directory ({})", self.directory.records.len()),
        };
        let block = Block::default().title(title).borders(Borders::ALL);

        if self.directory.records.is_empty() {
            let message = Paragraph::new("No records yet. Press '+' to add one or 'i' to import.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, chunks[0]);
        } else {
            let mut state = TableState::default().with_selected(Some(self.directory.selected));
            frame.render_stateful_widget(
                record_table(&self.directory.records, block),
                chunks[0],
                &mut state,
            );
        }

        let detail = self
            .directory
            .current_record()
            .map(Record::summary_line)
            .unwrap_or_default();
        let paragraph = Paragraph::new(detail)
            .block(Block::default().borders(Borders::TOP).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, chunks[1]);
    }

    fn draw_duplicates(&self, frame: &mut Frame, area: Rect, duplicates: &DuplicatesScreen) {
        let block = Block::default()
            .title(format!(
                "Duplicates - {} in {} groups, {} marked",
                plural(duplicates.records().len(), "record"),
                duplicates.group_count(),
                duplicates.marked.len()
            ))
            .borders(Borders::ALL);

        let mut previous_key = None;
        let items: Vec<ListItem> = duplicates
            .records()
            .iter()
            .map(|record| {
                let checkbox = if duplicates.is_marked(record) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let key = record.duplicate_key();
                let style = if previous_key == Some(key) {
                    Style::default()
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                previous_key = Some(key);
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{checkbox} ")),
                    Span::styled(record.summary_line(), style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(duplicates.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::AddingRecord(_) | Mode::EditingRecord { .. } | Mode::WritingNotice(_)) => &[
                ("[Tab]", " Next field   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            (_, Mode::Searching(_)) => &[
                ("[Tab]", " Change field   "),
                ("[Enter]", " Search   "),
                ("[Esc]", " Cancel"),
            ],
            (_, Mode::PromptingPath(_)) => &[("[Enter]", " Confirm   "), ("[Esc]", " Cancel")],
            (
                _,
                Mode::ConfirmContinueAdding
                | Mode::ConfirmRecordDelete(_)
                | Mode::ConfirmReset(_)
                | Mode::ConfirmDuplicateRemoval(_),
            ) => &[("[Y]", " Yes   "), ("[N]", " No")],
            (Screen::Duplicates(_), Mode::Normal) => &[
                ("[Space]", " Mark   "),
                ("[Enter]", " Remove marked   "),
                ("[Ctrl+O]", " Email   "),
                ("[Esc]", " Back"),
            ],
            (Screen::Directory, Mode::Normal) => &[
                ("[+]", " Add  "),
                ("[e]", " Edit  "),
                ("[-]", " Delete  "),
                ("[f]", " Search  "),
                ("[F5]", " All  "),
                ("[d]", " Duplicates  "),
                ("[i/x]", " Import/Export  "),
                ("[s]", " Save results  "),
                ("[t/m/g]", " Notices  "),
                ("[Ctrl+O]", " Email  "),
                ("[q]", " Quit"),
            ],
        };

        Line::from(
            keys.iter()
                .flat_map(|(key, action)| {
                    [Span::styled(*key, key_style), Span::raw(*action)]
                })
                .collect::<Vec<_>>(),
        )
    }

    fn draw_record_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &RecordForm) {
        let popup_area = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = RecordField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));
        lines.push(form_hint(form.error.as_deref()));

        frame.render_widget(Paragraph::new(lines), inner);

        let row = RecordField::ALL
            .iter()
            .position(|f| *f == form.active)
            .unwrap_or(0);
        frame.set_cursor_position((
            inner.x + form.cursor_offset() as u16,
            inner.y + row as u16,
        ));
    }

    fn draw_notice_form(&self, frame: &mut Frame, area: Rect, form: &NoticeForm) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(form.title()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.lines();
        lines.push(Line::from(""));
        lines.push(form_hint(form.error.as_deref()));

        frame.render_widget(Paragraph::new(lines), inner);
        frame.set_cursor_position((
            inner.x + form.cursor_offset() as u16,
            inner.y + form.active as u16,
        ));
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, form: &SearchForm) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = form.prefix();
        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("{prefix}{}", form.keyword)))
            .block(block.clone());
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + (prefix.chars().count() + form.keyword.chars().count()) as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_path_prompt(&self, frame: &mut Frame, area: Rect, prompt: &PathPrompt) {
        let popup_area = centered_rect(80, 20, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(prompt.purpose.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("File: {}", prompt.input)),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to confirm, Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
        frame.set_cursor_position((
            inner.x + ("File: ".len() + prompt.input.chars().count()) as u16,
            inner.y,
        ));
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line>) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn blank_form(&self) -> RecordForm {
        RecordForm::new(&self.settings.landline_mask, &self.settings.cell_mask)
    }

    fn save_new_record(&mut self, form: &mut RecordForm) -> Result<()> {
        let record = form.to_record(None)?;
        self.repo.insert(&record)?;
        self.set_status(format!("Added {record}."), StatusKind::Info);
        self.reload_directory(None);
        Ok(())
    }

    fn save_existing_record(&mut self, id: i64, form: &mut RecordForm) -> Result<()> {
        let record = form.to_record(Some(id))?;
        if self.repo.update(id, &record)? == 0 {
            self.set_status(
                format!("Record {id} no longer exists; nothing updated."),
                StatusKind::Error,
            );
        } else {
            self.set_status(format!("Updated {record}."), StatusKind::Info);
        }
        self.reload_directory(Some(id));
        Ok(())
    }

    /// Re-run the active search, or list everything when none is active. On a
    /// store failure the previous rows stay and the footer shows the error.
    fn reload_directory(&mut self, focus_id: Option<i64>) -> bool {
        let records = match &self.directory.search {
            Some(search) => self.repo.search(search.field.column(), &search.keyword),
            None => self.repo.list_all(),
        };
        match records {
            Ok(records) => {
                self.directory.set_records(records, focus_id);
                true
            }
            Err(err) => {
                self.set_status(
                    format!("Could not refresh the directory: {err}"),
                    StatusKind::Error,
                );
                false
            }
        }
    }

    fn show_all(&mut self) -> bool {
        self.directory.search = None;
        let refreshed = self.reload_directory(None);
        self.directory.select_first();
        refreshed
    }

    fn open_duplicates(&mut self) {
        if self.dialogs.is_open(Dialog::Duplicates) {
            self.set_status("The duplicates view is already open.", StatusKind::Error);
            return;
        }

        let duplicates = match DuplicatesScreen::load(self.repo.clone()) {
            Ok(duplicates) => duplicates,
            Err(err) => {
                self.set_status(err.to_string(), StatusKind::Error);
                return;
            }
        };

        if duplicates.is_empty() {
            self.set_status("No duplicate records found.", StatusKind::Info);
            return;
        }

        self.dialogs.try_open(Dialog::Duplicates);
        self.set_status(
            format!(
                "{} in {} groups share office, landline, sector and extension.",
                plural(duplicates.records().len(), "record"),
                duplicates.group_count()
            ),
            StatusKind::Info,
        );
        self.screen = Screen::Duplicates(duplicates);
    }

    fn close_duplicates(&mut self) {
        self.dialogs.close(Dialog::Duplicates);
        self.screen = Screen::Directory;
    }

    fn remove_duplicates(&mut self, ids: &[i64]) {
        let Screen::Duplicates(duplicates) = &mut self.screen else {
            return;
        };

        let outcome = duplicates.remove(ids);
        let now_empty = duplicates.is_empty();

        match outcome {
            Ok(report) if report.failures.is_empty() => self.set_status(
                format!("Removed {}.", plural(report.deleted, "record")),
                StatusKind::Info,
            ),
            Ok(report) => self.set_status(
                format!(
                    "Removed {}; {} could not be removed: {}",
                    plural(report.deleted, "record"),
                    report.failures.len(),
                    report.failures[0].1
                ),
                StatusKind::Error,
            ),
            Err(err) => self.set_status(err.to_string(), StatusKind::Error),
        }

        if now_empty {
            self.close_duplicates();
            if let Some(status) = &mut self.status {
                status.text.push_str(" No duplicates remain.");
            }
        }
        self.reload_directory(None);
    }

    fn open_path_prompt(&mut self, purpose: PathPurpose) -> Mode {
        if purpose != PathPurpose::SaveResults && !self.settings.import_export_enabled() {
            self.set_status("Import and export are disabled in settings.", StatusKind::Error);
            return Mode::Normal;
        }

        let file_name = match purpose {
            PathPurpose::Import | PathPurpose::Export => EXPORT_FILE_NAME,
            PathPurpose::SaveResults => SEARCH_RESULTS_FILE_NAME,
        };
        let suggestion = self
            .settings
            .notices_dir()
            .map(|dir| dir.join(file_name))
            .unwrap_or_else(|_| PathBuf::from(file_name));

        self.clear_status();
        self.open(Mode::PromptingPath(PathPrompt::new(purpose, suggestion)))
    }

    fn run_file_action(&mut self, purpose: PathPurpose, path: PathBuf) -> Result<String> {
        let message = match purpose {
            PathPurpose::Import => {
                let summary = self.repo.import_csv(&path)?;
                let mut message = format!(
                    "Imported {}; {} already present, {} malformed and {} invalid rows skipped.",
                    plural(summary.inserted, "record"),
                    summary.already_present,
                    summary.malformed,
                    summary.invalid
                );
                if !self.reload_directory(None) {
                    message.push_str(" The list could not be refreshed.");
                }
                message
            }
            PathPurpose::Export => {
                let written = self
                    .repo
                    .export_csv(&path, self.settings.export_delimiter_byte())?;
                format!(
                    "Exported {} to {}.",
                    plural(written, "record"),
                    path.display()
                )
            }
            PathPurpose::SaveResults => {
                let written = save_search_results(&path, &self.directory.records)?;
                format!("Saved {} to {}.", plural(written, "record"), path.display())
            }
        };
        Ok(message)
    }

    fn request_reset(&mut self) -> Result<Mode> {
        if !self.settings.allow_reset {
            self.set_status("Clearing the directory is disabled in settings.", StatusKind::Error);
            return Ok(Mode::Normal);
        }

        let count = match self.repo.count_all() {
            Ok(count) => count,
            Err(err) => {
                self.set_status(err.to_string(), StatusKind::Error);
                return Ok(Mode::Normal);
            }
        };
        if count == 0 {
            self.set_status("The directory is already empty.", StatusKind::Info);
            return Ok(Mode::Normal);
        }
        self.clear_status();
        Ok(self.open(Mode::ConfirmReset(count)))
    }

    fn open_notice(&mut self, kind: NoticeKind) -> Mode {
        self.clear_status();
        self.open(Mode::WritingNotice(NoticeForm::new(kind)))
    }
}

fn record_table<'a>(records: &'a [Record], block: Block<'a>) -> Table<'a> {
    let header = Row::new(
        RecordField::ALL
            .iter()
            .map(|field| Cell::from(field.label())),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = records
        .iter()
        .map(|record| Row::new(record.fields().map(Cell::from)));

    let widths = [
        Constraint::Percentage(18),
        Constraint::Length(16),
        Constraint::Percentage(14),
        Constraint::Percentage(14),
        Constraint::Length(9),
        Constraint::Length(17),
        Constraint::Min(10),
    ];

    Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().fg(Color::Yellow))
        .highlight_symbol("> ")
}

fn form_hint(error: Option<&str>) -> Line<'static> {
    match error {
        Some(error) => Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled(
            "Enter to save, Tab to switch, Esc to cancel",
            Style::default().fg(Color::Gray),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::db::ensure_schema;

    fn app_with_one_record() -> (TempDir, PathBuf, App) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.sqlite");
        ensure_schema(&path).unwrap();
        let repo = SqliteDirectory::new(&path);
        repo.insert(&Record::new("Finance", "1234", "10")).unwrap();
        let app = App::new(repo, Settings::default()).unwrap();
        (dir, path, app)
    }

    fn shows_error(app: &App) -> bool {
        matches!(
            app.status,
            Some(StatusMessage {
                kind: StatusKind::Error,
                ..
            })
        )
    }

    #[test]
    fn show_all_reports_store_failure_and_keeps_running() {
        let (_dir, path, mut app) = app_with_one_record();
        fs::remove_file(&path).unwrap();

        assert!(!app.handle_key(KeyCode::F(5)).unwrap());
        assert!(shows_error(&app));
        assert_eq!(app.directory.records.len(), 1);
    }

    #[test]
    fn failed_delete_leaves_dialogs_usable() {
        let (_dir, path, mut app) = app_with_one_record();
        fs::remove_file(&path).unwrap();

        app.handle_key(KeyCode::Delete).unwrap();
        assert!(matches!(app.mode, Mode::ConfirmRecordDelete(_)));
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert!(shows_error(&app));

        app.handle_key(KeyCode::Char('+')).unwrap();
        assert!(matches!(app.mode, Mode::AddingRecord(_)));
        assert!(app.dialogs.is_open(Dialog::RecordForm));
    }
}
