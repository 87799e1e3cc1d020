//! Header navigation blocks and the block library.
//!
//! Provides:
//! - `header_subcategory_block`: title + author chosen from a closed list
//! - `header_category_block`: title, category page and 1 to 4 subcategories
//! - `BlockLibrary`: registry of named top-level blocks with validation

use std::collections::BTreeMap;

use serde_json::Value;

use super::schema::{Block, BlockCount, Enumeration, SchemaError, StreamBlock, StructBlock};
use super::validation::{ErrorCode, ValidationErrors};

/// Name of the repeated child inside a category's `subcategories` stream.
pub const SUBCATEGORY_BLOCK: &str = "subcategory";

/// Name of the category child inside the home page header stream.
pub const CATEGORY_BLOCK: &str = "category";

/// Library key of the home page header stream.
pub const HEADER_STREAM: &str = "header";

/// Fewest subcategories a header category may hold.
pub const MIN_SUBCATEGORIES: usize = 1;

/// Most subcategories a header category may hold.
pub const MAX_SUBCATEGORIES: usize = 4;

/// A header subcategory: a title and its author.
pub fn header_subcategory_block(authors: &Enumeration) -> Result<Block, SchemaError> {
    let block = StructBlock::new([
        ("title", Block::char("Título", Some(100))),
        (
            "author",
            Block::choice(
                "Autor",
                authors.clone(),
                Some(authors.first_value().to_string()),
            )?,
        ),
    ])?;
    Ok(Block::structure("Subcategoría", block))
}

/// A header category: title, the category page and its subcategories.
pub fn header_category_block(authors: &Enumeration) -> Result<Block, SchemaError> {
    let subcategories = StreamBlock::new([(SUBCATEGORY_BLOCK, header_subcategory_block(authors)?)])?
        .with_block_count(
            SUBCATEGORY_BLOCK,
            BlockCount::between(MIN_SUBCATEGORIES, MAX_SUBCATEGORIES),
        )?;

    let block = StructBlock::new([
        ("title", Block::char("Título", Some(100))),
        ("category_page", Block::page_chooser("Categoría")),
        ("subcategories", Block::stream("sub-categorías", subcategories)),
    ])?
    .with_template("blocks/header_category_block.html")
    .with_icon("fa fa-list");

    Ok(Block::structure("Cabecera de Categoría", block))
}

/// The home page header: any number of category blocks.
pub fn header_stream_block(authors: &Enumeration) -> Result<Block, SchemaError> {
    let stream = StreamBlock::new([(CATEGORY_BLOCK, header_category_block(authors)?)])?;
    Ok(Block::stream("Cabecera", stream).optional())
}

/// Registry of named top-level blocks.
#[derive(Debug, Clone, Default)]
pub struct BlockLibrary {
    blocks: BTreeMap<String, Block>,
}

impl BlockLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library holding the header blocks built over `authors`.
    pub fn with_standard_blocks(authors: &Enumeration) -> Result<Self, SchemaError> {
        let mut library = Self::new();
        library.register(CATEGORY_BLOCK, header_category_block(authors)?);
        library.register(SUBCATEGORY_BLOCK, header_subcategory_block(authors)?);
        library.register(HEADER_STREAM, header_stream_block(authors)?);
        Ok(library)
    }

    /// Register a block under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, block: Block) {
        self.blocks.insert(name.into(), block);
    }

    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The home page header stream, if registered.
    pub fn header_stream(&self) -> Option<&Block> {
        self.blocks.get(HEADER_STREAM)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Clean `value` against the block registered as `name`.
    ///
    /// An unregistered name is reported as an error on the empty path.
    pub fn validate(&self, name: &str, value: &Value) -> Result<Value, ValidationErrors> {
        match self.blocks.get(name) {
            Some(block) => block.clean(value),
            None => Err(ValidationErrors::single(
                "",
                ErrorCode::UnknownBlock,
                format!("unknown block '{name}'"),
            )),
        }
    }

    /// All registered schemas as JSON.
    pub fn describe(&self) -> Value {
        Value::Object(
            self.blocks
                .iter()
                .map(|(name, block)| (name.clone(), block.describe()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn authors() -> Enumeration {
        Enumeration::from_pairs(&[("ana", "Ana"), ("luis", "Luis")]).unwrap()
    }

    fn category(subcategories: usize) -> Value {
        let subs: Vec<Value> = (0..subcategories)
            .map(|i| {
                json!({
                    "type": SUBCATEGORY_BLOCK,
                    "value": {"title": format!("Sub {i}"), "author": "luis"}
                })
            })
            .collect();
        json!({
            "title": "Proyectos",
            "category_page": Uuid::now_v7().to_string(),
            "subcategories": subs,
        })
    }

    #[test]
    fn subcategory_count_bounds() {
        let block = header_category_block(&authors()).unwrap();

        let errors = block.clean(&category(0)).unwrap_err();
        assert!(errors.has("subcategories", ErrorCode::Cardinality));

        for n in 1..=4 {
            assert!(block.clean(&category(n)).is_ok(), "{n} subcategories");
        }

        let errors = block.clean(&category(5)).unwrap_err();
        assert!(errors.has("subcategories", ErrorCode::Cardinality));
    }

    #[test]
    fn author_outside_enumeration_rejected() {
        let block = header_subcategory_block(&authors()).unwrap();
        let errors = block
            .clean(&json!({"title": "Interiores", "author": "pedro"}))
            .unwrap_err();
        assert!(errors.has("author", ErrorCode::Enumeration));
    }

    #[test]
    fn author_defaults_to_first_choice() {
        let block = header_subcategory_block(&authors()).unwrap();
        let cleaned = block.clean(&json!({"title": "Interiores"})).unwrap();
        assert_eq!(cleaned["author"], "ana");
    }

    #[test]
    fn blank_author_is_not_defaulted() {
        let block = header_subcategory_block(&authors()).unwrap();
        let errors = block
            .clean(&json!({"title": "T", "author": ""}))
            .unwrap_err();
        assert!(errors.has("author", ErrorCode::Required));

        let cleaned = block
            .clean(&json!({"title": "T", "author": null}))
            .unwrap();
        assert_eq!(cleaned["author"], "ana");
    }

    #[test]
    fn title_is_bounded_to_100_chars() {
        let block = header_subcategory_block(&authors()).unwrap();
        let errors = block
            .clean(&json!({"title": "x".repeat(101), "author": "ana"}))
            .unwrap_err();
        assert!(errors.has("title", ErrorCode::MaxLength));
    }

    #[test]
    fn category_meta_is_declared() {
        let described = header_category_block(&authors()).unwrap().describe();
        assert_eq!(described["meta"]["icon"], "fa fa-list");
        assert_eq!(
            described["meta"]["template"],
            "blocks/header_category_block.html"
        );
        let subs = &described["children"][2]["block"];
        assert_eq!(subs["block_counts"][SUBCATEGORY_BLOCK]["min_num"], 1);
        assert_eq!(subs["block_counts"][SUBCATEGORY_BLOCK]["max_num"], 4);
    }

    #[test]
    fn library_holds_standard_blocks() {
        let library = BlockLibrary::with_standard_blocks(&authors()).unwrap();
        assert_eq!(library.len(), 3);
        assert!(library.contains(CATEGORY_BLOCK));
        assert!(library.contains(SUBCATEGORY_BLOCK));
        assert!(library.contains(HEADER_STREAM));
    }

    #[test]
    fn library_validates_header_stream() {
        let library = BlockLibrary::with_standard_blocks(&authors()).unwrap();
        let header = json!([{"type": CATEGORY_BLOCK, "value": category(2)}]);
        assert!(library.validate(HEADER_STREAM, &header).is_ok());

        let bad = json!([{"type": CATEGORY_BLOCK, "value": category(0)}]);
        let errors = library.validate(HEADER_STREAM, &bad).unwrap_err();
        assert!(errors.has("0.subcategories", ErrorCode::Cardinality));
    }

    #[test]
    fn library_rejects_unknown_block() {
        let library = BlockLibrary::new();
        assert!(library.is_empty());
        let errors = library.validate("carousel", &json!({})).unwrap_err();
        assert!(errors.has("", ErrorCode::UnknownBlock));
    }
}
