//! Domain models that mirror the `contacts` table and get passed between the
//! repository and the terminal UI. They stay light-weight data holders; the
//! only behavior living here is field validation and display helpers.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,63}$").expect("valid email regex")
});

/// The seven editable columns of a directory entry, in CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    SecretaryOffice,
    Landline,
    Sector,
    Responsible,
    Extension,
    Cell,
    Email,
}

impl RecordField {
    pub const ALL: [RecordField; 7] = [
        RecordField::SecretaryOffice,
        RecordField::Landline,
        RecordField::Sector,
        RecordField::Responsible,
        RecordField::Extension,
        RecordField::Cell,
        RecordField::Email,
    ];

    /// Column name in the SQLite schema.
    pub fn column(self) -> &'static str {
        match self {
            RecordField::SecretaryOffice => "secretary_office",
            RecordField::Landline => "landline",
            RecordField::Sector => "sector",
            RecordField::Responsible => "responsible",
            RecordField::Extension => "extension",
            RecordField::Cell => "cell",
            RecordField::Email => "email",
        }
    }

    /// Attribute name as used by callers of the repository API.
    pub fn attribute(self) -> &'static str {
        match self {
            RecordField::SecretaryOffice => "secretaryOffice",
            RecordField::Landline => "landline",
            RecordField::Sector => "sector",
            RecordField::Responsible => "responsible",
            RecordField::Extension => "extension",
            RecordField::Cell => "cell",
            RecordField::Email => "email",
        }
    }

    /// Human label shown in forms, tables and the search picker.
    pub fn label(self) -> &'static str {
        match self {
            RecordField::SecretaryOffice => "Secretary office",
            RecordField::Landline => "Landline",
            RecordField::Sector => "Sector",
            RecordField::Responsible => "Responsible",
            RecordField::Extension => "Extension",
            RecordField::Cell => "Cell phone",
            RecordField::Email => "Email",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            RecordField::SecretaryOffice | RecordField::Landline | RecordField::Extension
        )
    }

    /// Next field in column order, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous field in column order, wrapping around.
    pub fn previous(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a filter name matches none of the seven fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter choice: {0}")]
pub struct UnknownField(pub String);

impl FromStr for RecordField {
    type Err = UnknownField;

    /// Accepts the column name, the attribute name or the display label,
    /// ignoring ASCII case and surrounding whitespace.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        RecordField::ALL
            .into_iter()
            .find(|field| {
                wanted.eq_ignore_ascii_case(field.column())
                    || wanted.eq_ignore_ascii_case(field.attribute())
                    || wanted.eq_ignore_ascii_case(field.label())
            })
            .ok_or_else(|| UnknownField(value.to_string()))
    }
}

/// Reasons a record is refused before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{} is required.", .0.label())]
    MissingField(RecordField),
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),
}

impl ValidationError {
    /// Field the error refers to, so forms can move focus there.
    pub fn field(&self) -> RecordField {
        match self {
            ValidationError::MissingField(field) => *field,
            ValidationError::InvalidEmail(_) => RecordField::Email,
        }
    }
}

/// One directory entry. `id` stays `None` until the store assigns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: Option<i64>,
    pub secretary_office: String,
    pub landline: String,
    pub sector: String,
    pub responsible: String,
    pub extension: String,
    pub cell: String,
    pub email: String,
}

impl Record {
    /// Minimal entry carrying only the three required fields.
    pub fn new(secretary_office: &str, landline: &str, extension: &str) -> Self {
        Self {
            secretary_office: secretary_office.to_string(),
            landline: landline.to_string(),
            extension: extension.to_string(),
            ..Self::default()
        }
    }

    /// Build an unsaved record from seven values in CSV column order.
    pub fn from_fields(values: [String; 7]) -> Self {
        let [secretary_office, landline, sector, responsible, extension, cell, email] = values;
        Self {
            id: None,
            secretary_office,
            landline,
            sector,
            responsible,
            extension,
            cell,
            email,
        }
    }

    /// The seven values in CSV column order, without the id.
    pub fn fields(&self) -> [&str; 7] {
        [
            &self.secretary_office,
            &self.landline,
            &self.sector,
            &self.responsible,
            &self.extension,
            &self.cell,
            &self.email,
        ]
    }

    pub fn get(&self, field: RecordField) -> &str {
        match field {
            RecordField::SecretaryOffice => &self.secretary_office,
            RecordField::Landline => &self.landline,
            RecordField::Sector => &self.sector,
            RecordField::Responsible => &self.responsible,
            RecordField::Extension => &self.extension,
            RecordField::Cell => &self.cell,
            RecordField::Email => &self.email,
        }
    }

    pub fn set(&mut self, field: RecordField, value: impl Into<String>) {
        let value = value.into();
        match field {
            RecordField::SecretaryOffice => self.secretary_office = value,
            RecordField::Landline => self.landline = value,
            RecordField::Sector => self.sector = value,
            RecordField::Responsible => self.responsible = value,
            RecordField::Extension => self.extension = value,
            RecordField::Cell => self.cell = value,
            RecordField::Email => self.email = value,
        }
    }

    /// Check required fields in column order, then the email shape. Reports
    /// the first problem only.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for field in RecordField::ALL {
            if field.is_required() && self.get(field).trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }

        let email = self.email.trim();
        if !email.is_empty() && !EMAIL_RE.is_match(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }

        Ok(())
    }

    /// Four-column key shared by the members of a duplicate group.
    pub fn duplicate_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.secretary_office,
            &self.landline,
            &self.sector,
            &self.extension,
        )
    }

    /// One-line `Label: value | Label: value` rendering used by the detail
    /// pane under the directory table.
    pub fn summary_line(&self) -> String {
        RecordField::ALL
            .iter()
            .map(|field| format!("{}: {}", field.label(), self.get(*field)))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sector.trim().is_empty() {
            write!(f, "{} - ext. {}", self.secretary_office, self.extension)
        } else {
            write!(
                f,
                "{} / {} - ext. {}",
                self.secretary_office, self.sector, self.extension
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_parsing_accepts_column_attribute_and_label() {
        assert_eq!(
            "secretary_office".parse::<RecordField>(),
            Ok(RecordField::SecretaryOffice)
        );
        assert_eq!(
            "secretaryOffice".parse::<RecordField>(),
            Ok(RecordField::SecretaryOffice)
        );
        assert_eq!("Cell phone".parse::<RecordField>(), Ok(RecordField::Cell));
        assert_eq!(" EMAIL ".parse::<RecordField>(), Ok(RecordField::Email));
        assert!("id".parse::<RecordField>().is_err());
    }

    #[test]
    fn validate_reports_first_missing_required_field() {
        let mut record = Record::new("", "", "");
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingField(RecordField::SecretaryOffice))
        );

        record.secretary_office = "Finance".into();
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingField(RecordField::Landline))
        );

        record.landline = "1234".into();
        assert_eq!(
            record.validate(),
            Err(ValidationError::MissingField(RecordField::Extension))
        );

        record.extension = "10".into();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn whitespace_only_required_field_is_missing() {
        let record = Record::new("Finance", "   ", "10");
        assert_eq!(
            record.validate().unwrap_err().field(),
            RecordField::Landline
        );
    }

    #[test]
    fn email_checked_only_when_present() {
        let mut record = Record::new("Finance", "1234", "10");
        record.email = "ana@city.gov.br".into();
        assert!(record.validate().is_ok());

        record.email = "not-an-email".into();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));

        record.email = "ana@city".into();
        assert!(record.validate().is_err());
    }

    #[test]
    fn fields_follow_csv_column_order() {
        let record = Record::from_fields([
            "Health".into(),
            "3333-0000".into(),
            "Pharmacy".into(),
            "Ana".into(),
            "204".into(),
            "99999-0000".into(),
            "ana@health.org".into(),
        ]);
        assert_eq!(record.fields()[4], "204");
        assert_eq!(record.get(RecordField::Responsible), "Ana");
        assert!(record.id.is_none());
    }

    #[test]
    fn summary_line_lists_every_field() {
        let record = Record::new("Finance", "1234", "10");
        let line = record.summary_line();
        assert!(line.starts_with("Secretary office: Finance | Landline: 1234"));
        assert!(line.contains("Extension: 10"));
        assert_eq!(line.matches(" | ").count(), 6);
    }

    #[test]
    fn field_cycling_wraps() {
        assert_eq!(RecordField::Email.next(), RecordField::SecretaryOffice);
        assert_eq!(RecordField::SecretaryOffice.previous(), RecordField::Email);
    }
}
