use std::path::PathBuf;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::masks::{apply_mask, digits_only, mask_placeholder, slot_count};
use crate::models::{Record, RecordField, ValidationError};
use crate::notices::{Notice, NoticeKind};

/// Render a `Label: value` line, highlighting the focused input.
fn input_line(label: &str, value: &str, active: bool, required: bool) -> Line<'static> {
    let display = if value.is_empty() && required {
        "<required>".to_string()
    } else {
        value.to_string()
    };

    let style = if active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(display, style),
    ])
}

/// Typed character handling shared by every masked input: digits only, and
/// never more than the mask has slots.
fn push_masked(raw: &mut String, mask: &str, ch: char) -> bool {
    if ch.is_ascii_digit() && raw.chars().count() < slot_count(mask) {
        raw.push(ch);
        true
    } else {
        false
    }
}

/// Add/edit form for a directory entry. Masked fields keep raw digits while
/// typing and are formatted on display and on save. A loaded value that does
/// not fit its mask stays verbatim until the field is edited.
#[derive(Clone)]
pub(crate) struct RecordForm {
    values: [String; 7],
    verbatim: [bool; 7],
    pub(crate) active: RecordField,
    pub(crate) error: Option<String>,
    landline_mask: String,
    cell_mask: String,
}

impl RecordForm {
    pub(crate) fn new(landline_mask: &str, cell_mask: &str) -> Self {
        Self {
            values: Default::default(),
            verbatim: [false; 7],
            active: RecordField::SecretaryOffice,
            error: None,
            landline_mask: landline_mask.to_string(),
            cell_mask: cell_mask.to_string(),
        }
    }

    pub(crate) fn from_record(record: &Record, landline_mask: &str, cell_mask: &str) -> Self {
        let mut form = Self::new(landline_mask, cell_mask);
        for field in RecordField::ALL {
            let idx = field_index(field);
            let value = record.get(field);
            match form.mask(field) {
                Some(mask) if apply_mask(mask, &digits_only(value)) != value => {
                    form.values[idx] = value.to_string();
                    form.verbatim[idx] = true;
                }
                Some(_) => form.values[idx] = digits_only(value),
                None => form.values[idx] = value.to_string(),
            }
        }
        form
    }

    /// Switch a verbatim masked field to raw digits before it is edited.
    fn start_editing(&mut self, field: RecordField) {
        let idx = field_index(field);
        if !self.verbatim[idx] {
            return;
        }
        self.verbatim[idx] = false;
        let slots = self.mask(field).map_or(0, slot_count);
        self.values[idx] = digits_only(&self.values[idx]).chars().take(slots).collect();
    }

    fn mask(&self, field: RecordField) -> Option<&str> {
        let mask = match field {
            RecordField::Landline => &self.landline_mask,
            RecordField::Cell => &self.cell_mask,
            _ => return None,
        };
        (!mask.is_empty()).then_some(mask.as_str())
    }

    pub(crate) fn next_field(&mut self) {
        self.active = self.active.next();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = self.active.previous();
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.start_editing(self.active);
        let idx = field_index(self.active);
        match self.mask(self.active).map(str::to_string) {
            Some(mask) => push_masked(&mut self.values[idx], &mask, ch),
            None => {
                self.values[idx].push(ch);
                true
            }
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.start_editing(self.active);
        self.values[field_index(self.active)].pop();
    }

    /// Value as it would be saved.
    pub(crate) fn value(&self, field: RecordField) -> String {
        let idx = field_index(field);
        let raw = &self.values[idx];
        match self.mask(field) {
            Some(mask) if !self.verbatim[idx] => apply_mask(mask, raw),
            _ => raw.trim().to_string(),
        }
    }

    /// Build the record to persist, or move focus to the offending field.
    pub(crate) fn to_record(&mut self, id: Option<i64>) -> Result<Record, ValidationError> {
        let mut record = Record {
            id,
            ..Record::default()
        };
        for field in RecordField::ALL {
            record.set(field, self.value(field));
        }

        if let Err(err) = record.validate() {
            self.active = err.field();
            self.error = Some(err.to_string());
            return Err(err);
        }
        Ok(record)
    }

    pub(crate) fn build_line(&self, field: RecordField) -> Line<'static> {
        let idx = field_index(field);
        let raw = &self.values[idx];
        let shown = match self.mask(field) {
            _ if self.verbatim[idx] => raw.clone(),
            Some(mask) if self.active == field => mask_placeholder(mask, raw),
            Some(mask) => apply_mask(mask, raw),
            None => raw.clone(),
        };
        input_line(
            field.label(),
            &shown,
            self.active == field,
            field.is_required(),
        )
    }

    /// Cursor column inside the active line, after the label.
    pub(crate) fn cursor_offset(&self) -> usize {
        let idx = field_index(self.active);
        let raw = &self.values[idx];
        let prefix = self.active.label().chars().count() + 2;
        match self.mask(self.active) {
            Some(mask) if !self.verbatim[idx] => prefix + apply_mask(mask, raw).chars().count(),
            _ => prefix + raw.chars().count(),
        }
    }
}

fn field_index(field: RecordField) -> usize {
    RecordField::ALL
        .iter()
        .position(|f| *f == field)
        .unwrap_or(0)
}

/// Field picker plus keyword for the search bar.
#[derive(Clone)]
pub(crate) struct SearchForm {
    pub(crate) field: RecordField,
    pub(crate) keyword: String,
}

impl Default for SearchForm {
    fn default() -> Self {
        Self {
            field: RecordField::SecretaryOffice,
            keyword: String::new(),
        }
    }
}

impl SearchForm {
    pub(crate) fn prefix(&self) -> String {
        format!("Search [{}]: ", self.field.label())
    }
}

/// Input form for one of the switchboard notices.
#[derive(Clone)]
pub(crate) struct NoticeForm {
    pub(crate) notice: Notice,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

impl NoticeForm {
    pub(crate) fn new(kind: NoticeKind) -> Self {
        Self {
            notice: Notice::new(kind),
            active: 0,
            error: None,
        }
    }

    pub(crate) fn title(&self) -> &'static str {
        self.notice.kind().title()
    }

    fn field_count(&self) -> usize {
        self.notice.kind().fields().len()
    }

    pub(crate) fn next_field(&mut self) {
        self.active = (self.active + 1) % self.field_count();
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = (self.active + self.field_count() - 1) % self.field_count();
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        let field = self.notice.kind().fields()[self.active];
        let mut value = self.notice.values()[self.active].clone();
        let accepted = match field.mask {
            Some(mask) => push_masked(&mut value, mask, ch),
            None => {
                value.push(ch);
                true
            }
        };
        if accepted {
            self.store(value);
        }
        accepted
    }

    pub(crate) fn backspace(&mut self) {
        let mut value = self.notice.values()[self.active].clone();
        value.pop();
        self.store(value);
    }

    fn store(&mut self, raw: String) {
        self.notice.set(self.active, raw);
    }

    /// Notice with masked values formatted, ready to save.
    pub(crate) fn formatted(&self) -> Notice {
        let kind = self.notice.kind();
        Notice::with_values(
            kind,
            kind.fields()
                .iter()
                .zip(self.notice.values())
                .map(|(field, raw)| match field.mask {
                    Some(mask) => apply_mask(mask, raw),
                    None => raw.clone(),
                }),
        )
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        self.notice
            .kind()
            .fields()
            .iter()
            .zip(self.notice.values())
            .enumerate()
            .map(|(idx, (field, raw))| {
                let shown = match field.mask {
                    Some(mask) if idx == self.active => mask_placeholder(mask, raw),
                    Some(mask) => apply_mask(mask, raw),
                    None => raw.clone(),
                };
                input_line(field.label, &shown, idx == self.active, field.required)
            })
            .collect()
    }

    pub(crate) fn cursor_offset(&self) -> usize {
        let field = self.notice.kind().fields()[self.active];
        let raw = &self.notice.values()[self.active];
        let value_len = match field.mask {
            Some(mask) => apply_mask(mask, raw).chars().count(),
            None => raw.chars().count(),
        };
        field.label.chars().count() + 2 + value_len
    }
}

/// What a path prompt is collecting a file name for.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathPurpose {
    Import,
    Export,
    SaveResults,
}

impl PathPurpose {
    pub(crate) fn title(self) -> &'static str {
        match self {
            PathPurpose::Import => "Import CSV",
            PathPurpose::Export => "Export CSV",
            PathPurpose::SaveResults => "Save search results",
        }
    }
}

#[derive(Clone)]
pub(crate) struct PathPrompt {
    pub(crate) purpose: PathPurpose,
    pub(crate) input: String,
}

impl PathPrompt {
    pub(crate) fn new(purpose: PathPurpose, suggestion: PathBuf) -> Self {
        Self {
            purpose,
            input: suggestion.display().to_string(),
        }
    }

    pub(crate) fn path(&self) -> Option<PathBuf> {
        let trimmed = self.input.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CELL_MASK, DEFAULT_LANDLINE_MASK};

    fn type_text(form: &mut RecordForm, text: &str) {
        for ch in text.chars() {
            form.push_char(ch);
        }
    }

    #[test]
    fn masked_fields_accept_digits_only_and_format_on_save() {
        let mut form = RecordForm::new(DEFAULT_LANDLINE_MASK, DEFAULT_CELL_MASK);
        type_text(&mut form, "Finance");
        form.next_field();
        type_text(&mut form, "11a3333-44449");
        form.active = RecordField::Extension;
        type_text(&mut form, "204");

        let record = form.to_record(None).unwrap();
        assert_eq!(record.secretary_office, "Finance");
        assert_eq!(record.landline, "(11) 3333-4444");
        assert_eq!(record.extension, "204");
    }

    #[test]
    fn validation_failure_focuses_field() {
        let mut form = RecordForm::new(DEFAULT_LANDLINE_MASK, DEFAULT_CELL_MASK);
        type_text(&mut form, "Finance");
        form.active = RecordField::Email;

        assert!(form.to_record(None).is_err());
        assert_eq!(form.active, RecordField::Landline);
        assert_eq!(form.error.as_deref(), Some("Landline is required."));
    }

    #[test]
    fn empty_mask_means_free_text() {
        let mut form = RecordForm::new("", DEFAULT_CELL_MASK);
        form.active = RecordField::Landline;
        type_text(&mut form, "ramal 12");
        assert_eq!(form.value(RecordField::Landline), "ramal 12");
    }

    #[test]
    fn editing_keeps_existing_values() {
        let mut record = Record::new("Health", "(11) 2222-3333", "9");
        record.id = Some(4);
        record.email = "a@b.org".into();

        let mut form = RecordForm::from_record(&record, DEFAULT_LANDLINE_MASK, DEFAULT_CELL_MASK);
        assert_eq!(form.to_record(Some(4)).unwrap(), record);
    }

    #[test]
    fn untouched_unmasked_landline_is_saved_unchanged() {
        let mut record = Record::new("Finance", "1234", "10");
        record.id = Some(1);
        record.cell = "ramal".into();

        let mut form = RecordForm::from_record(&record, DEFAULT_LANDLINE_MASK, DEFAULT_CELL_MASK);
        form.active = RecordField::Email;
        type_text(&mut form, "fin@city.gov.br");

        let saved = form.to_record(Some(1)).unwrap();
        assert_eq!(saved.landline, "1234");
        assert_eq!(saved.cell, "ramal");
        assert_eq!(saved.email, "fin@city.gov.br");
    }

    #[test]
    fn editing_an_unmasked_landline_switches_to_the_mask() {
        let record = Record::new("Finance", "1234", "10");
        let mut form = RecordForm::from_record(&record, DEFAULT_LANDLINE_MASK, DEFAULT_CELL_MASK);
        form.active = RecordField::Landline;
        type_text(&mut form, "5");

        assert_eq!(form.value(RecordField::Landline), "(12) 345");
    }

    #[test]
    fn notice_form_masks_date_and_time() {
        let mut form = NoticeForm::new(NoticeKind::TransportCancellation);
        form.active = 3;
        for ch in "08032024".chars() {
            form.push_char(ch);
        }
        form.next_field();
        for ch in "0630x".chars() {
            form.push_char(ch);
        }

        let notice = form.formatted();
        assert_eq!(notice.value(3), "08/03/2024");
        assert_eq!(notice.value(4), "06:30");
    }

    #[test]
    fn path_prompt_rejects_blank_input() {
        let mut prompt = PathPrompt::new(PathPurpose::Export, PathBuf::from("/tmp/out.csv"));
        assert_eq!(prompt.path(), Some(PathBuf::from("/tmp/out.csv")));
        prompt.input = "   ".into();
        assert!(prompt.path().is_none());
    }
}
