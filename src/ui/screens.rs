use std::collections::BTreeSet;

use crate::db::SqliteDirectory;
use crate::duplicates::{DuplicateResolver, RemovalReport};
use crate::error::DirectoryResult;
use crate::models::{Record, RecordField};

/// Clamp `selected + offset` into `0..len`.
fn offset_index(selected: usize, offset: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let target = selected as isize + offset;
    target.clamp(0, len as isize - 1) as usize
}

/// Filter currently applied to the directory table.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct ActiveSearch {
    pub(crate) field: RecordField,
    pub(crate) keyword: String,
}

/// Records shown on the main table, either the full directory or the result
/// of the last search.
pub(crate) struct DirectoryScreen {
    pub(crate) records: Vec<Record>,
    pub(crate) selected: usize,
    pub(crate) search: Option<ActiveSearch>,
}

impl DirectoryScreen {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            selected: 0,
            search: None,
        }
    }

    /// Replace the rows, keeping focus on `focus_id` when it is still present.
    pub(crate) fn set_records(&mut self, records: Vec<Record>, focus_id: Option<i64>) {
        self.records = records;
        if let Some(idx) = focus_id.and_then(|id| self.records.iter().position(|r| r.id == Some(id)))
        {
            self.selected = idx;
        }
        self.ensure_in_bounds();
    }

    pub(crate) fn current_record(&self) -> Option<&Record> {
        self.records.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, offset, self.records.len());
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.records.len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        if self.selected >= self.records.len() {
            self.selected = self.records.len().saturating_sub(1);
        }
    }
}

/// Duplicate review: the flattened members of every duplicate group with a
/// set of ids marked for removal.
pub(crate) struct DuplicatesScreen {
    resolver: DuplicateResolver<SqliteDirectory>,
    pub(crate) selected: usize,
    pub(crate) marked: BTreeSet<i64>,
}

impl DuplicatesScreen {
    pub(crate) fn load(repo: SqliteDirectory) -> DirectoryResult<Self> {
        Ok(Self {
            resolver: DuplicateResolver::load(repo)?,
            selected: 0,
            marked: BTreeSet::new(),
        })
    }

    pub(crate) fn records(&self) -> &[Record] {
        self.resolver.records()
    }

    pub(crate) fn group_count(&self) -> usize {
        self.resolver.groups().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.resolver.is_empty()
    }

    pub(crate) fn is_marked(&self, record: &Record) -> bool {
        record.id.is_some_and(|id| self.marked.contains(&id))
    }

    pub(crate) fn toggle_current(&mut self) {
        let Some(id) = self.records().get(self.selected).and_then(|r| r.id) else {
            return;
        };
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
    }

    pub(crate) fn marked_ids(&self) -> Vec<i64> {
        self.marked.iter().copied().collect()
    }

    /// Delete the given ids and reload. Marks are cleared either way.
    pub(crate) fn remove(&mut self, ids: &[i64]) -> DirectoryResult<RemovalReport> {
        self.marked.clear();
        let report = self.resolver.remove(ids)?;
        self.ensure_in_bounds();
        Ok(report)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, offset, self.records().len());
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.records().len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        let len = self.records().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}
