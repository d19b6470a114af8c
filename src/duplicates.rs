//! Duplicate review on top of [`RecordRepository`]: load the members of every
//! duplicate group, delete a caller-chosen subset one id at a time, and reload.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::db::RecordRepository;
use crate::error::DirectoryResult;
use crate::models::Record;

/// Records sharing secretary office, landline, sector and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub secretary_office: String,
    pub landline: String,
    pub sector: String,
    pub extension: String,
    pub members: Vec<Record>,
}

/// Result of removing a batch of selected duplicates. Each delete is
/// independent; one failure does not stop the others.
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub deleted: usize,
    pub failures: Vec<(i64, String)>,
}

pub struct DuplicateResolver<R> {
    repo: R,
    records: Vec<Record>,
}

impl<R: RecordRepository> DuplicateResolver<R> {
    /// Create a resolver and load the current duplicates.
    pub fn load(repo: R) -> DirectoryResult<Self> {
        let mut resolver = Self {
            repo,
            records: Vec::new(),
        };
        resolver.refresh()?;
        Ok(resolver)
    }

    pub fn refresh(&mut self) -> DirectoryResult<()> {
        self.records = self.repo.find_duplicate_groups()?;
        Ok(())
    }

    /// Flattened membership of every duplicate group.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Members grouped by their shared key. Group order follows the key;
    /// member order is whatever the store returned.
    pub fn groups(&self) -> Vec<DuplicateGroup> {
        let mut grouped: BTreeMap<(&str, &str, &str, &str), Vec<Record>> = BTreeMap::new();
        for record in &self.records {
            grouped
                .entry(record.duplicate_key())
                .or_default()
                .push(record.clone());
        }

        grouped
            .into_iter()
            .map(
                |((secretary_office, landline, sector, extension), members)| DuplicateGroup {
                    secretary_office: secretary_office.to_string(),
                    landline: landline.to_string(),
                    sector: sector.to_string(),
                    extension: extension.to_string(),
                    members,
                },
            )
            .collect()
    }

    /// Delete every id in `ids`, then reload the duplicates.
    pub fn remove(&mut self, ids: &[i64]) -> DirectoryResult<RemovalReport> {
        let mut report = RemovalReport::default();

        for &id in ids {
            match self.repo.delete(id) {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    warn!(
                        "event=duplicate_remove module=duplicates status=error id={} error={}",
                        id, err
                    );
                    report.failures.push((id, err.to_string()));
                }
            }
        }

        info!(
            "event=duplicate_remove module=duplicates status=ok requested={} deleted={}",
            ids.len(),
            report.deleted
        );

        self.refresh()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;

    use super::*;
    use crate::db::ImportSummary;
    use crate::error::DirectoryError;

    /// In-memory repository that refuses to delete ids listed in `locked`.
    #[derive(Default)]
    struct FakeRepo {
        records: RefCell<Vec<Record>>,
        locked: Vec<i64>,
    }

    impl FakeRepo {
        fn with(records: Vec<Record>, locked: Vec<i64>) -> Self {
            Self {
                records: RefCell::new(records),
                locked,
            }
        }
    }

    impl RecordRepository for &FakeRepo {
        fn list_all(&self) -> DirectoryResult<Vec<Record>> {
            Ok(self.records.borrow().clone())
        }

        fn search(&self, _field: &str, _keyword: &str) -> DirectoryResult<Vec<Record>> {
            Ok(Vec::new())
        }

        fn insert(&self, record: &Record) -> DirectoryResult<()> {
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }

        fn update(&self, _id: i64, _record: &Record) -> DirectoryResult<usize> {
            Ok(0)
        }

        fn delete(&self, id: i64) -> DirectoryResult<()> {
            if self.locked.contains(&id) {
                return Err(DirectoryError::SessionClosed);
            }
            let mut records = self.records.borrow_mut();
            let before = records.len();
            records.retain(|r| r.id != Some(id));
            if records.len() == before {
                Err(DirectoryError::NotFound(id))
            } else {
                Ok(())
            }
        }

        fn count_all(&self) -> DirectoryResult<usize> {
            Ok(self.records.borrow().len())
        }

        fn reset(&self) -> DirectoryResult<usize> {
            Ok(self.records.borrow_mut().drain(..).count())
        }

        fn import_csv(&self, _path: &Path) -> DirectoryResult<ImportSummary> {
            Ok(ImportSummary::default())
        }

        fn export_csv(&self, _path: &Path, _delimiter: u8) -> DirectoryResult<usize> {
            Ok(0)
        }

        fn find_duplicate_groups(&self) -> DirectoryResult<Vec<Record>> {
            let records = self.records.borrow();
            Ok(records
                .iter()
                .filter(|r| {
                    records
                        .iter()
                        .any(|o| o.id != r.id && o.duplicate_key() == r.duplicate_key())
                })
                .cloned()
                .collect())
        }
    }

    fn record(id: i64, office: &str, extension: &str) -> Record {
        Record {
            id: Some(id),
            ..Record::new(office, "1234", extension)
        }
    }

    #[test]
    fn groups_members_by_shared_key() {
        let repo = FakeRepo::with(
            vec![
                record(1, "Finance", "10"),
                record(2, "Finance", "10"),
                record(3, "Health", "20"),
                record(4, "Health", "20"),
                record(5, "Health", "20"),
                record(6, "Works", "30"),
            ],
            vec![],
        );

        let resolver = DuplicateResolver::load(&repo).unwrap();
        let groups = resolver.groups();

        assert_eq!(resolver.records().len(), 5);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].secretary_office, "Finance");
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].members.len(), 3);
    }

    #[test]
    fn failed_delete_does_not_block_the_rest() {
        let repo = FakeRepo::with(
            vec![
                record(1, "Finance", "10"),
                record(2, "Finance", "10"),
                record(3, "Finance", "10"),
            ],
            vec![2],
        );

        let mut resolver = DuplicateResolver::load(&repo).unwrap();
        let report = resolver.remove(&[2, 3, 99]).unwrap();

        assert_eq!(report.deleted, 1);
        let failed: Vec<i64> = report.failures.iter().map(|(id, _)| *id).collect();
        assert_eq!(failed, vec![2, 99]);
        // 1 and 2 remain and still form a group.
        assert_eq!(resolver.records().len(), 2);
    }

    #[test]
    fn resolver_is_empty_after_last_duplicate_removed() {
        let repo = FakeRepo::with(
            vec![record(1, "Finance", "10"), record(2, "Finance", "10")],
            vec![],
        );

        let mut resolver = DuplicateResolver::load(&repo).unwrap();
        resolver.remove(&[2]).unwrap();

        assert!(resolver.is_empty());
        assert_eq!(repo.records.borrow().len(), 1);
    }
}
