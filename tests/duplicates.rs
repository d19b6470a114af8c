use std::collections::BTreeSet;

use switchboard_directory::{
    ensure_schema, DuplicateResolver, Record, RecordRepository, SqliteDirectory,
};
use tempfile::TempDir;

fn store_with(records: &[Record]) -> (TempDir, SqliteDirectory) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.sqlite");
    ensure_schema(&path).unwrap();
    let repo = SqliteDirectory::new(path);
    for record in records {
        repo.insert(record).unwrap();
    }
    (dir, repo)
}

fn entry(office: &str, extension: &str, responsible: &str) -> Record {
    Record {
        responsible: responsible.into(),
        ..Record::new(office, "1234", extension)
    }
}

fn ids(records: &[Record]) -> BTreeSet<i64> {
    records.iter().filter_map(|r| r.id).collect()
}

#[test]
fn groups_reflect_shared_keys() {
    let (_dir, repo) = store_with(&[
        entry("Finance", "10", "Ana"),
        entry("Finance", "10", "Bruno"),
        entry("Health", "20", "Carla"),
        entry("Health", "20", "Davi"),
        entry("Health", "20", "Eva"),
        entry("Works", "30", "Fabio"),
    ]);

    let resolver = DuplicateResolver::load(repo).unwrap();
    let groups = resolver.groups();

    assert_eq!(resolver.records().len(), 5);
    let sizes: BTreeSet<(String, usize)> = groups
        .iter()
        .map(|g| (g.secretary_office.clone(), g.members.len()))
        .collect();
    assert_eq!(
        sizes,
        BTreeSet::from([("Finance".to_string(), 2), ("Health".to_string(), 3)])
    );
}

#[test]
fn removing_selection_reloads_remaining_duplicates() {
    let (_dir, repo) = store_with(&[
        entry("Finance", "10", "Ana"),
        entry("Finance", "10", "Bruno"),
        entry("Health", "20", "Carla"),
        entry("Health", "20", "Davi"),
    ]);
    let mut resolver = DuplicateResolver::load(repo.clone()).unwrap();
    let finance: Vec<i64> = resolver
        .records()
        .iter()
        .filter(|r| r.secretary_office == "Finance")
        .filter_map(|r| r.id)
        .collect();

    let report = resolver.remove(&finance[..1]).unwrap();

    assert_eq!(report.deleted, 1);
    assert!(report.failures.is_empty());
    assert_eq!(repo.count_all().unwrap(), 3);
    assert!(resolver
        .records()
        .iter()
        .all(|r| r.secretary_office == "Health"));
}

#[test]
fn missing_ids_are_reported_without_stopping_the_batch() {
    let (_dir, repo) = store_with(&[entry("Finance", "10", "Ana"), entry("Finance", "10", "Bruno")]);
    let mut resolver = DuplicateResolver::load(repo.clone()).unwrap();
    let existing: Vec<i64> = ids(resolver.records()).into_iter().collect();

    let report = resolver.remove(&[999, existing[0]]).unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 999);
    assert!(resolver.is_empty());
    assert_eq!(ids(&repo.list_all().unwrap()), BTreeSet::from([existing[1]]));
}
