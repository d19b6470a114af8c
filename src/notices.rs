//! Switchboard notices: short Portuguese text messages the operator fills in
//! and appends to a timestamped file under the notices folder.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::info;

use crate::error::{DirectoryError, DirectoryResult};

const BODY_STAMP: &str = "%H:%M %d/%m/%Y";
const FILE_STAMP: &str = "%H-%M %d-%m-%Y";
const FALLBACK_FILE_NAME: &str = "recado.txt";

/// One input of a notice form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeField {
    pub label: &'static str,
    pub required: bool,
    /// Digit mask applied while typing, if any.
    pub mask: Option<&'static str>,
}

const fn field(label: &'static str, required: bool) -> NoticeField {
    NoticeField {
        label,
        required,
        mask: None,
    }
}

const fn masked(label: &'static str, mask: &'static str) -> NoticeField {
    NoticeField {
        label,
        required: false,
        mask: Some(mask),
    }
}

const TRANSPORT_FIELDS: [NoticeField; 8] = [
    field("Sender", true),
    field("Subject", true),
    field("Patient", true),
    masked("Travel date", "##/##/####"),
    masked("Travel time", "##:##"),
    field("City", true),
    field("Meeting point", false),
    field("Sender's phone", false),
];

const DISCHARGE_FIELDS: [NoticeField; 11] = [
    field("Hospital", true),
    field("Patient", true),
    field("Observation", true),
    field("Hospital room", true),
    field("Bed", true),
    field("Transport", true),
    field("Patient contact", true),
    field("Escort", true),
    field("Escort contact", true),
    field("Responsible for discharge", true),
    field("Responsible's contact", true),
];

const MESSAGE_FIELDS: [NoticeField; 4] = [
    field("Sender", true),
    field("Subject", true),
    field("Message", true),
    field("Sender's phone", false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    TransportCancellation,
    MedicalDischarge,
    GeneralMessage,
}

impl NoticeKind {
    pub fn title(self) -> &'static str {
        match self {
            NoticeKind::TransportCancellation => "Transport cancellation",
            NoticeKind::MedicalDischarge => "Medical discharge",
            NoticeKind::GeneralMessage => "General message",
        }
    }

    pub fn fields(self) -> &'static [NoticeField] {
        match self {
            NoticeKind::TransportCancellation => &TRANSPORT_FIELDS,
            NoticeKind::MedicalDischarge => &DISCHARGE_FIELDS,
            NoticeKind::GeneralMessage => &MESSAGE_FIELDS,
        }
    }
}

/// A filled-in notice. `values` follow the order of [`NoticeKind::fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    kind: NoticeKind,
    values: Vec<String>,
}

impl Notice {
    /// Empty notice of `kind`.
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            kind,
            values: vec![String::new(); kind.fields().len()],
        }
    }

    /// Notice with the given values; missing trailing values are left empty
    /// and extra ones are ignored.
    pub fn with_values<I, S>(kind: NoticeKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut notice = Self::new(kind);
        for (slot, value) in notice.values.iter_mut().zip(values) {
            *slot = value.into();
        }
        notice
    }

    pub fn kind(&self) -> NoticeKind {
        self.kind
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn value(&self, idx: usize) -> &str {
        self.values.get(idx).map(|v| v.trim()).unwrap_or("")
    }

    pub fn set(&mut self, idx: usize, value: impl Into<String>) {
        if let Some(slot) = self.values.get_mut(idx) {
            *slot = value.into();
        }
    }

    /// Fail with the label of the first empty required field.
    pub fn validate(&self) -> DirectoryResult<()> {
        for (idx, field) in self.kind.fields().iter().enumerate() {
            if field.required && self.value(idx).is_empty() {
                return Err(DirectoryError::IncompleteNotice(field.label));
            }
        }
        Ok(())
    }

    /// Text written for this notice, stamped with `at`.
    pub fn render(&self, at: NaiveDateTime) -> String {
        let stamp = at.format(BODY_STAMP);
        let v = |idx| self.value(idx);

        match self.kind {
            NoticeKind::TransportCancellation => format!(
                "{sender} solicitou o cancelamento da viagem agendada para {patient} marcada para o dia {date} às {time}, com destino à cidade de {city}.\nPonto: {point}\nContato: {phone}\n\nAvisado por {sender} às {stamp}\n",
                sender = v(0),
                patient = v(2),
                date = v(3),
                time = v(4),
                city = v(5),
                point = v(6),
                phone = v(7),
            ),
            NoticeKind::MedicalDischarge => format!(
                "ALTA MÉDICA\n\nHospital {}\nPaciente: {}\nObservação: {}\nQuarto: {}\nLeito: {}\nTransporte: {}\nContato: {}\nAcompanhante: {}\nContato do acompanhante: {}\n\nAvisado por {} as {stamp}.\nContato: {}\n\n",
                v(0),
                v(1),
                v(2),
                v(3),
                v(4),
                v(5),
                v(6),
                v(7),
                v(8),
                v(9),
                v(10),
            ),
            NoticeKind::GeneralMessage => format!(
                "{message}.\nContato: {phone}\n\nAvisado por {sender} às {stamp}\n",
                message = v(2),
                phone = v(3),
                sender = v(0),
            ),
        }
    }

    /// File name the notice is appended to when saved at `at`.
    pub fn file_name(&self, at: NaiveDateTime) -> String {
        let stamp = at.format(FILE_STAMP);
        let name = match self.kind {
            NoticeKind::MedicalDischarge if self.value(0).is_empty() => "Alta médica.txt".into(),
            NoticeKind::MedicalDischarge => {
                format!("Alta médica - Hospital {} {stamp}.txt", self.value(0))
            }
            _ if self.value(1).is_empty() => FALLBACK_FILE_NAME.into(),
            _ => format!("{} {stamp}.txt", self.value(1)),
        };
        sanitize_file_name(&name)
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/// Validate `notice` and append its text to a file in `dir`, creating the
/// folder and file as needed. Returns the file written.
pub fn save_notice(dir: &Path, notice: &Notice, at: NaiveDateTime) -> DirectoryResult<PathBuf> {
    notice.validate()?;

    fs::create_dir_all(dir).map_err(|err| DirectoryError::file(dir, err))?;
    let path = dir.join(notice.file_name(at));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| DirectoryError::file(&path, err))?;
    file.write_all(notice.render(at).as_bytes())
        .map_err(|err| DirectoryError::file(&path, err))?;

    info!(
        "event=notice_saved module=notices status=ok kind={:?} path={}",
        notice.kind,
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn transport() -> Notice {
        Notice::with_values(
            NoticeKind::TransportCancellation,
            [
                "Maria",
                "Viagem",
                "João",
                "08/03/2024",
                "06:30",
                "Campinas",
                "Rodoviária",
                "3333-4444",
            ],
        )
    }

    #[test]
    fn transport_cancellation_text() {
        assert_eq!(
            transport().render(at()),
            "Maria solicitou o cancelamento da viagem agendada para João marcada para o dia 08/03/2024 às 06:30, com destino à cidade de Campinas.\nPonto: Rodoviária\nContato: 3333-4444\n\nAvisado por Maria às 14:05 07/03/2024\n"
        );
        assert_eq!(transport().file_name(at()), "Viagem 14-05 07-03-2024.txt");
    }

    #[test]
    fn general_message_text() {
        let notice = Notice::with_values(
            NoticeKind::GeneralMessage,
            ["Ana", "Reunião", "Reunião adiada", ""],
        );
        assert_eq!(
            notice.render(at()),
            "Reunião adiada.\nContato: \n\nAvisado por Ana às 14:05 07/03/2024\n"
        );
    }

    #[test]
    fn discharge_text_and_file_name() {
        let notice = Notice::with_values(
            NoticeKind::MedicalDischarge,
            [
                "Central", "José", "Estável", "12", "3", "Ambulância", "9999", "Rita", "8888",
                "Dr. Luz", "7777",
            ],
        );
        let text = notice.render(at());
        assert!(text.starts_with("ALTA MÉDICA\n\nHospital Central\nPaciente: José\n"));
        assert!(text.ends_with("Avisado por Dr. Luz as 14:05 07/03/2024.\nContato: 7777\n\n"));
        assert_eq!(
            notice.file_name(at()),
            "Alta médica - Hospital Central 14-05 07-03-2024.txt"
        );
    }

    #[test]
    fn first_missing_required_field_is_reported() {
        let mut notice = transport();
        notice.set(5, "  ");
        notice.set(2, "");
        assert!(matches!(
            notice.validate(),
            Err(DirectoryError::IncompleteNotice("Patient"))
        ));
    }

    #[test]
    fn path_separators_are_replaced() {
        let mut notice = transport();
        notice.set(1, "a/b\\c");
        assert_eq!(notice.file_name(at()), "a_b_c 14-05 07-03-2024.txt");
    }

    #[test]
    fn save_appends_and_refuses_incomplete() {
        let dir = tempfile::tempdir().unwrap();

        let path = save_notice(dir.path(), &transport(), at()).unwrap();
        save_notice(dir.path(), &transport(), at()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("solicitou o cancelamento").count(), 2);

        let empty = Notice::new(NoticeKind::GeneralMessage);
        assert!(save_notice(dir.path(), &empty, at()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
