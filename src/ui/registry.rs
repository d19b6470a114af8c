use std::collections::HashSet;

use crate::notices::NoticeKind;

/// Logical dialogs the UI can have open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Dialog {
    RecordForm,
    Search,
    Duplicates,
    FilePrompt,
    Confirm,
    Notice(NoticeKind),
}

impl Dialog {
    pub(crate) fn title(self) -> &'static str {
        match self {
            Dialog::RecordForm => "The record form",
            Dialog::Search => "The search bar",
            Dialog::Duplicates => "The duplicates view",
            Dialog::FilePrompt => "The file prompt",
            Dialog::Confirm => "A confirmation",
            Dialog::Notice(kind) => kind.title(),
        }
    }
}

/// Set of dialogs currently open. Opening one that is already open is refused
/// so each logical dialog exists at most once.
#[derive(Debug, Default)]
pub(crate) struct DialogRegistry {
    open: HashSet<Dialog>,
}

impl DialogRegistry {
    /// Mark `dialog` open. Returns false when it already was.
    pub(crate) fn try_open(&mut self, dialog: Dialog) -> bool {
        self.open.insert(dialog)
    }

    pub(crate) fn close(&mut self, dialog: Dialog) {
        self.open.remove(&dialog);
    }

    pub(crate) fn is_open(&self, dialog: Dialog) -> bool {
        self.open.contains(&dialog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_opens_once_until_closed() {
        let mut registry = DialogRegistry::default();
        assert!(registry.try_open(Dialog::Duplicates));
        assert!(!registry.try_open(Dialog::Duplicates));
        assert!(registry.is_open(Dialog::Duplicates));

        registry.close(Dialog::Duplicates);
        assert!(!registry.is_open(Dialog::Duplicates));
        assert!(registry.try_open(Dialog::Duplicates));
    }

    #[test]
    fn notice_kinds_are_tracked_separately() {
        let mut registry = DialogRegistry::default();
        assert!(registry.try_open(Dialog::Notice(NoticeKind::GeneralMessage)));
        assert!(registry.try_open(Dialog::Notice(NoticeKind::MedicalDischarge)));
        assert!(!registry.try_open(Dialog::Notice(NoticeKind::GeneralMessage)));
    }
}
