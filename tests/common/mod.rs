// tests/common/mod.rs

//! Shared test fixtures for integration tests.

use folio::ruleset::loader::parse_ruleset;
use folio::{ContentFile, Document, PersonEntry, RuleSet, LOGICAL_PHYSICAL};
use std::sync::Arc;

/// Rule set for the monograph scenarios: a logical tree of
/// Monograph/Chapter and a physical tree of BoundBook/Page.
pub const MONOGRAPH_RULESET: &str = r#"
[[metadata_type]]
name = "TitleDocMain"
labels = { en = "Main title", de = "Haupttitel" }

[[metadata_type]]
name = "Author"
is_person = true

[[metadata_type]]
name = "CatalogIDDigital"
is_identifier = true

[[metadata_type]]
name = "physPageNumber"

[[metadata_type]]
name = "logicalPageNumber"

[[struct_type]]
name = "Monograph"
allowed_children = ["Chapter"]

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1m"
default_display = true

[[struct_type.metadata]]
type = "Author"
num = "*"

[[struct_type.metadata]]
type = "CatalogIDDigital"
num = "1o"

[[struct_type]]
name = "Chapter"

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1o"

[[struct_type]]
name = "BoundBook"
allowed_children = ["Page"]

[[struct_type]]
name = "Page"

[[struct_type.metadata]]
type = "physPageNumber"
num = "1o"

[[struct_type.metadata]]
type = "logicalPageNumber"
num = "1o"
"#;

/// Rule set for the anchor scenarios: Journal and Article share the anchor
/// class "J", with a plain Volume level in between.
pub const JOURNAL_RULESET: &str = r#"
[[metadata_type]]
name = "TitleDocMain"

[[struct_type]]
name = "Journal"
anchor_class = "J"
allowed_children = ["Volume"]

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1o"

[[struct_type]]
name = "Volume"
allowed_children = ["Article"]

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1o"

[[struct_type]]
name = "Article"
anchor_class = "J"
allowed_children = ["Section"]

[[struct_type.metadata]]
type = "TitleDocMain"
num = "1o"

[[struct_type]]
name = "Section"
"#;

pub fn monograph_ruleset() -> Arc<RuleSet> {
    Arc::new(parse_ruleset(MONOGRAPH_RULESET).expect("monograph rule set parses"))
}

pub fn journal_ruleset() -> Arc<RuleSet> {
    Arc::new(parse_ruleset(JOURNAL_RULESET).expect("journal rule set parses"))
}

/// A monograph with one title, one author, and one referenced page
pub fn make_monograph_document(ruleset: &RuleSet) -> Document {
    let mut doc = Document::new();

    let root = doc.create_struct_node(ruleset.struct_type("Monograph").unwrap());
    doc.node_mut(root)
        .add_metadata_value("TitleDocMain", "Hello")
        .unwrap();
    doc.node_mut(root)
        .add_person(PersonEntry::with_name(
            ruleset.metadata_type("Author").unwrap(),
            "Doe",
            "John",
        ))
        .unwrap();
    doc.set_logical_root(root);

    let bound = doc.create_struct_node(ruleset.struct_type("BoundBook").unwrap());
    let page = doc.create_struct_node(ruleset.struct_type("Page").unwrap());
    doc.add_child(bound, page, None).unwrap();
    doc.node_mut(page)
        .add_metadata_value("physPageNumber", "1")
        .unwrap();
    doc.node_mut(page)
        .add_metadata_value("logicalPageNumber", "i")
        .unwrap();
    doc.set_physical_root(bound);

    doc.add_content_file(
        page,
        ContentFile::new("images/00000001.tif", "image/tiff"),
        None,
    );
    doc.add_reference_to(root, page, LOGICAL_PHYSICAL);

    doc
}

/// The Journal(J) -> Volume -> Article(J) -> Section tree
pub fn make_interrupted_journal(ruleset: &RuleSet) -> (Document, folio::NodeId) {
    let mut doc = Document::new();
    let journal = doc.create_struct_node(ruleset.struct_type("Journal").unwrap());
    let volume = doc.create_struct_node(ruleset.struct_type("Volume").unwrap());
    let article = doc.create_struct_node(ruleset.struct_type("Article").unwrap());
    let section = doc.create_struct_node(ruleset.struct_type("Section").unwrap());
    doc.add_child(journal, volume, None).unwrap();
    doc.add_child(volume, article, None).unwrap();
    doc.add_child(article, section, None).unwrap();
    doc.set_logical_root(journal);
    (doc, journal)
}
