// tests/conversion_integration.rs
//! Integration tests for the RDF-to-METS conversion pipeline:
//! - full driver runs over real files with backup and certification
//! - cardinality and child-type rejections at the model boundary
//! - anchor-hierarchy traversal failures
//! - cycle-safe equality between documents
//! - truncated copies for anchor serialization

mod common;

use common::{
    journal_ruleset, make_interrupted_journal, make_monograph_document, monograph_ruleset,
};
use folio::{
    ConversionDriver, FileFormat, FileOutcome, MetsFormat, ModelError, RdfFormat, ValueEntry,
};
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Full driver pipeline round trips
// =============================================================================

#[test]
fn minimal_round_trip_commits() {
    let rs = monograph_ruleset();
    let doc = make_monograph_document(&rs);

    let dir = TempDir::new().unwrap();
    let record = dir.path().join("record1");
    std::fs::create_dir(&record).unwrap();
    let meta = record.join("meta.xml");

    let mut rdf = RdfFormat::new(Arc::clone(&rs));
    rdf.set_document(doc);
    rdf.write(&meta).unwrap();

    let driver = ConversionDriver::new(Arc::clone(&rs));
    let summary = driver.run(dir.path());

    assert_eq!(summary.files_seen, 1);
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.rolled_back, 0);

    // The backup and both round-trip artifacts exist.
    assert!(record.join("meta.bak").exists());
    assert!(record.join("meta.fromMets.rdf.xml").exists());
    assert!(record.join("meta.orig.rdf.xml").exists());

    // The input file is now METS and loads back to an equal document.
    let mut mets = MetsFormat::new(Arc::clone(&rs));
    assert!(mets.read(&meta).unwrap());
    let mut original = RdfFormat::new(Arc::clone(&rs));
    original.read(&record.join("meta.bak")).unwrap();
    let mut reloaded = mets.take_document().unwrap();
    let mut original = original.take_document().unwrap();
    reloaded.sort_metadata_recursively(&rs);
    original.sort_metadata_recursively(&rs);
    assert!(original.deep_equals(&reloaded));

    // The reconverted RDF is token-equivalent to the backup.
    let comparison = folio::compare_files(
        &record.join("meta.bak"),
        &record.join("meta.fromMets.rdf.xml"),
    )
    .unwrap();
    assert!(comparison.matches, "{}", comparison.message);
}

#[test]
fn repeated_runs_pick_distinct_backup_names() {
    let rs = monograph_ruleset();
    let dir = TempDir::new().unwrap();
    let meta = dir.path().join("meta.xml");

    let mut rdf = RdfFormat::new(Arc::clone(&rs));
    rdf.set_document(make_monograph_document(&rs));
    rdf.write(&meta).unwrap();

    let driver = ConversionDriver::new(Arc::clone(&rs));
    assert_eq!(driver.process_file(&meta), FileOutcome::Committed);

    // Second run consumes the METS file; it rolls back at the RDF stage but
    // must not clobber the first backup.
    driver.process_file(&meta);

    assert!(dir.path().join("meta.bak").exists());
    assert!(dir.path().join("meta(1).bak").exists());
}

#[test]
fn session_summary_counts_mixed_outcomes() {
    let rs = monograph_ruleset();
    let dir = TempDir::new().unwrap();

    // One convertible record and one with unparseable metadata.
    let good = dir.path().join("good");
    std::fs::create_dir(&good).unwrap();
    let mut rdf = RdfFormat::new(Arc::clone(&rs));
    rdf.set_document(make_monograph_document(&rs));
    rdf.write(&good.join("meta.xml")).unwrap();

    let bad = dir.path().join("bad");
    std::fs::create_dir(&bad).unwrap();
    std::fs::write(bad.join("meta.xml"), "<not-metadata/>").unwrap();

    let driver = ConversionDriver::new(Arc::clone(&rs));
    let summary = driver.run(dir.path());

    assert_eq!(summary.files_seen, 2);
    assert_eq!(summary.committed, 1);
    assert_eq!(summary.rolled_back, 1);

    // The failed record keeps its original content next to the backup.
    assert_eq!(
        std::fs::read_to_string(bad.join("meta.xml")).unwrap(),
        "<not-metadata/>"
    );
    assert!(bad.join("meta.bak").exists());
}

#[test]
fn hidden_metadata_survives_the_round_trip() {
    let rs = monograph_ruleset();
    let mut doc = make_monograph_document(&rs);
    let root = doc.logical_root().unwrap();
    // Internal entries bypass the schema and are unbounded.
    for value in ["a", "b"] {
        doc.node_mut(root)
            .add_metadata(folio::ValueEntry::with_value(
                Arc::new(folio::MetadataType::new("_digitalOrigin")),
                value,
            ))
            .unwrap();
    }

    let dir = TempDir::new().unwrap();
    let meta = dir.path().join("meta.xml");
    let mut rdf = RdfFormat::new(Arc::clone(&rs));
    rdf.set_document(doc);
    rdf.write(&meta).unwrap();

    let driver = ConversionDriver::new(Arc::clone(&rs));
    assert_eq!(driver.process_file(&meta), FileOutcome::Committed);

    let mut back = MetsFormat::new(rs);
    back.read(&meta).unwrap();
    let reread = back.document().unwrap();
    let root = reread.logical_root().unwrap();
    assert_eq!(reread.node(root).count_md_of_type("_digitalOrigin"), 2);
}

// =============================================================================
// Cardinality rejection
// =============================================================================

#[test]
fn second_mandatory_title_is_rejected() {
    let rs = monograph_ruleset();
    let mut doc = make_monograph_document(&rs);
    let root = doc.logical_root().unwrap();

    let err = doc
        .node_mut(root)
        .add_metadata(ValueEntry::with_value(
            rs.metadata_type("TitleDocMain").unwrap(),
            "B",
        ))
        .unwrap_err();

    assert!(matches!(err, ModelError::MetadataTypeNotAllowed { .. }));
    assert_eq!(doc.node(root).count_md_of_type("TitleDocMain"), 1);
    assert_eq!(doc.node(root).metadata()[0].value(), Some("Hello"));
}

// =============================================================================
// Child-type rejection
// =============================================================================

#[test]
fn page_is_not_allowed_under_monograph() {
    let rs = monograph_ruleset();
    let mut doc = make_monograph_document(&rs);
    let root = doc.logical_root().unwrap();
    let children_before = doc.node(root).children().to_vec();

    let page = doc.create_struct_node(rs.struct_type("Page").unwrap());
    let err = doc.add_child(root, page, None).unwrap_err();

    assert!(matches!(err, ModelError::TypeNotAllowedAsChild { .. }));
    assert_eq!(doc.node(root).children(), children_before.as_slice());
    assert!(doc.node(page).parent().is_none());
}

// =============================================================================
// Anchor interruption
// =============================================================================

#[test]
fn interrupted_anchor_hierarchy_fails_the_traversal() {
    let rs = journal_ruleset();
    let (doc, journal) = make_interrupted_journal(&rs);

    match doc.anchor_classes(journal) {
        Err(ModelError::Preferences(detail)) => {
            assert!(detail.contains("interruption"), "detail: {}", detail);
        }
        other => panic!("expected a rule-set violation, got {:?}", other),
    }
}

// =============================================================================
// Cycle-safe equality
// =============================================================================

#[test]
fn mutual_references_compare_equal_until_a_type_differs() {
    let rs = monograph_ruleset();

    let build = |to_kind: &str, from_kind: &str| {
        let mut doc = folio::Document::new();
        let logical = doc.create_struct_node(rs.struct_type("Chapter").unwrap());
        let physical = doc.create_struct_node(rs.struct_type("Page").unwrap());
        doc.set_logical_root(logical);
        doc.set_physical_root(physical);
        doc.add_reference_to(logical, physical, to_kind);
        doc.add_reference_to(physical, logical, from_kind);
        doc
    };

    let a = build("x", "y");
    let b = build("x", "y");
    assert!(a.deep_equals(&b));

    let c = build("z", "y");
    assert!(!a.deep_equals(&c));
    let d = build("x", "z");
    assert!(!a.deep_equals(&d));
}

// =============================================================================
// Truncated copy
// =============================================================================

#[test]
fn truncated_copy_stops_one_level_below_the_anchor_region() {
    let rs = journal_ruleset();
    let (mut doc, journal) = make_interrupted_journal(&rs);

    doc.node_mut(journal)
        .add_metadata_value("TitleDocMain", "A Journal")
        .unwrap();
    let volume = doc.node(journal).children()[0];
    doc.node_mut(volume)
        .add_metadata_value("TitleDocMain", "Vol. 1")
        .unwrap();

    let copy = doc.copy_truncated(journal, "J");

    // The root keeps its metadata in full.
    assert_eq!(doc.node(copy).metadata().len(), 1);
    assert_eq!(doc.node(copy).metadata()[0].value(), Some("A Journal"));

    // Volume survives as a stub carrying only the label-type entry.
    let volume_copy = doc.node(copy).children()[0];
    assert_eq!(doc.node(volume_copy).type_name(), "Volume");
    assert_eq!(doc.node(volume_copy).metadata().len(), 1);

    // Article survives below it as a childless stub; Section is gone.
    assert_eq!(doc.node(volume_copy).children().len(), 1);
    let article_copy = doc.node(volume_copy).children()[0];
    assert_eq!(doc.node(article_copy).type_name(), "Article");
    assert!(doc.node(article_copy).children().is_empty());
}

// =============================================================================
// Adapter round trips with administrative metadata
// =============================================================================

#[test]
fn mets_preserves_administrative_fragments() {
    let rs = monograph_ruleset();
    let mut doc = make_monograph_document(&rs);
    doc.add_tech_md(folio::TechMd::new(
        "TMD_0001",
        r#"<premis:object xmlns:premis="info:lc/xmlns/premis-v2"/>"#,
    ));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.xml");
    let mut out = MetsFormat::new(Arc::clone(&rs));
    out.set_document(doc);
    out.write(&path).unwrap();

    let mut back = MetsFormat::new(rs);
    back.read(&path).unwrap();
    let amd = back.document().unwrap().amd_sec().unwrap();
    assert_eq!(
        amd.tech_md("TMD_0001").unwrap().fragment,
        r#"<premis:object xmlns:premis="info:lc/xmlns/premis-v2"/>"#
    );
}

#[test]
fn archive_round_trip_under_the_same_ruleset() {
    let rs = monograph_ruleset();
    let doc = make_monograph_document(&rs);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.archive.json");

    let mut out = folio::ArchiveFormat::new(Arc::clone(&rs));
    out.set_document(doc);
    out.write(&path).unwrap();

    let mut back = folio::ArchiveFormat::new(rs);
    back.read(&path).unwrap();
    assert!(out.document().unwrap().deep_equals(back.document().unwrap()));

    let outline = back.document().unwrap().outline();
    assert!(outline.contains("Monograph"), "outline: {}", outline);
    assert!(outline.contains("Author: Doe, John"), "outline: {}", outline);
}

#[test]
fn content_validator_reports_detached_pages() {
    let rs = monograph_ruleset();
    let mut doc = make_monograph_document(&rs);
    let root = doc.logical_root().unwrap();
    let page = doc.node(root).refs_to()[0].target;
    doc.remove_reference_to(root, page);

    let report = folio::ContentValidator::new(&rs).validate(&doc, "test");
    assert!(!report.is_clean());
    assert_eq!(report.structs_without_pages, vec!["Monograph"]);
    assert_eq!(report.pages_without_structs, vec!["1 (i)"]);
}
