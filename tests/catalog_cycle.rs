mod support;

use support::{checksummer_env::ChecksummerEnvGuard, tree::TreeFixture};

use checksummer::{
    catalog::{Catalog, CatalogError, FileRecord, RecordFilter, TriState},
    config::{self, AppConfig},
    scanner::{HashAlgorithm, Pipeline, PipelineSettings, ScanError},
};

fn settings() -> PipelineSettings {
    PipelineSettings {
        commit_interval: 3,
        reconcile_page_size: 2,
        ..PipelineSettings::default()
    }
}

fn paths(records: impl Iterator<Item = Result<FileRecord, CatalogError>>) -> Vec<String> {
    records.map(|record| record.expect("read record").path).collect()
}

#[test]
fn full_cycle_detects_duplicates_deletions_and_changes() {
    let mut fixture = TreeFixture::new(&[
        ("photos/a.jpg", "same bytes"),
        ("backup/a-copy.jpg", "same bytes"),
        ("docs/unique.txt", "only one of these"),
        ("docs/notes/todo.md", "- write tests"),
    ]);

    let first = Pipeline::new(&mut fixture.catalog, settings())
        .reindex_check()
        .expect("first reindex");
    assert_eq!(first.collect.inserted, 4);
    assert_eq!(first.checksum.hashed, 4);
    assert_eq!(first.ok, 4);
    assert_eq!(first.changed, 0);

    let groups: Vec<_> = fixture
        .catalog
        .list_duplicates()
        .collect::<Result<_, _>>()
        .expect("duplicates");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths, vec!["backup/a-copy.jpg", "photos/a.jpg"]);

    fixture.write("docs/unique.txt", "only one of thesE");
    fixture.remove("docs/notes/todo.md");
    let second = Pipeline::new(&mut fixture.catalog, settings())
        .reindex_check()
        .expect("second reindex");
    assert_eq!(second.collect.inserted, 0);
    assert_eq!(second.reconcile.missing, 1);
    assert_eq!(second.changed, 1);
    assert_eq!(second.ok, 2);

    assert_eq!(paths(fixture.catalog.show_changed()), vec!["docs/unique.txt"]);
    assert_eq!(
        paths(fixture.catalog.show_deleted()),
        vec!["docs/notes/todo.md"]
    );
    let todo = fixture.record("docs/notes/todo.md");
    assert_eq!(todo.found, TriState::False);
    assert!(todo.checksum.is_some());

    assert_eq!(fixture.catalog.prune_deleted().expect("prune deleted"), 1);
    assert_eq!(fixture.catalog.prune_changed().expect("prune changed"), 1);
    let reset = fixture.record("docs/unique.txt");
    assert_eq!(reset.checksum, None);
    assert_eq!(reset.integrity_ok, TriState::Unknown);

    let third = Pipeline::new(&mut fixture.catalog, settings())
        .reindex_check()
        .expect("third reindex");
    assert_eq!(third.checksum.hashed, 1);
    assert_eq!(third.ok, 3);
    assert_eq!(third.changed, 0);
    let summary = fixture.catalog.summary().expect("summary");
    assert_eq!(summary.records, 3);
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.changed, 0);
    assert_eq!(summary.pending_checksums, 0);
}

#[test]
fn repeated_collection_never_duplicates_records() {
    let mut fixture = TreeFixture::new(&[("a", "1"), ("b/c", "2"), ("b/d/e", "3")]);
    let mut pipeline = Pipeline::new(&mut fixture.catalog, settings());
    let first = pipeline.collect().expect("first collect");
    let second = pipeline.collect().expect("second collect");
    assert_eq!(first.inserted, 3);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_cataloged, 3);
    assert!(second.peak_in_flight <= 1);
    drop(pipeline);
    assert_eq!(fixture.catalog.count(RecordFilter::All).expect("count"), 3);
}

#[test]
fn reappearing_file_reuses_its_record() {
    let mut fixture = TreeFixture::new(&[("keep.txt", "v1")]);
    Pipeline::new(&mut fixture.catalog, settings())
        .collect()
        .expect("collect");
    let original = fixture.record("keep.txt");

    fixture.remove("keep.txt");
    Pipeline::new(&mut fixture.catalog, settings())
        .check()
        .expect("check while missing");
    assert_eq!(fixture.record("keep.txt").found, TriState::False);

    fixture.write("keep.txt", "v2 is longer");
    let mut pipeline = Pipeline::new(&mut fixture.catalog, settings());
    pipeline.collect().expect("collect again");
    pipeline.check().expect("check again");
    drop(pipeline);
    let back = fixture.record("keep.txt");
    assert_eq!(back.id, original.id);
    assert_eq!(back.found, TriState::True);
    assert_eq!(back.size, Some(12));
}

#[test]
fn catalog_keeps_its_hash_algorithm() {
    let mut fixture = TreeFixture::new(&[("x.bin", "abc")]);
    let blake = PipelineSettings {
        hash_algorithm: HashAlgorithm::Blake3,
        ..settings()
    };
    let mut pipeline = Pipeline::new(&mut fixture.catalog, blake);
    pipeline.collect().expect("collect");
    pipeline.make_checksums().expect("checksums");
    drop(pipeline);

    let stats = Pipeline::new(&mut fixture.catalog, settings())
        .reindex_check()
        .expect("reindex with sha256 configured");
    assert_eq!(stats.ok, 1);
    assert_eq!(
        fixture.record("x.bin").checksum,
        Some(blake3::hash(b"abc").to_hex().to_string())
    );
}

#[test]
fn catalog_without_base_path_refuses_to_scan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut catalog = Catalog::open(temp.path().join("catalog.db")).expect("open");
    let err = Pipeline::new(&mut catalog, settings())
        .reindex_check()
        .expect_err("no base path");
    assert!(matches!(err, ScanError::MissingBasePath));
}

#[test]
fn config_home_env_redirects_config_and_default_catalog() {
    let temp = tempfile::tempdir().expect("tempdir");
    let _env = ChecksummerEnvGuard::set_config_home(temp.path());

    let loaded = config::load_or_default().expect("load defaults");
    assert_eq!(loaded, AppConfig::default());
    let catalog_path = loaded.resolved_catalog_path().expect("catalog path");
    assert!(catalog_path.starts_with(temp.path()));

    let custom = AppConfig {
        commit_interval: 42,
        ..AppConfig::default()
    };
    config::save(&custom).expect("save");
    assert_eq!(config::load_or_default().expect("reload"), custom);
}

#[cfg(unix)]
#[test]
fn backslash_in_file_name_is_cataloged_as_present() {
    let mut fixture = TreeFixture::new(&[("a\\b.txt", "payload")]);
    let mut pipeline = Pipeline::new(&mut fixture.catalog, settings());
    pipeline.collect().expect("collect");
    let reconciled = pipeline.check().expect("check");
    drop(pipeline);
    assert_eq!(reconciled.found, 1);
    assert_eq!(reconciled.missing, 0);
    assert_eq!(fixture.record("a\\b.txt").found, TriState::True);
}
