//! Structured-content schemas and their validator.
//!
//! A block schema is plain data: a tree of [`Block`]s built from a handful of
//! field kinds (short text, long text, choice, page reference, struct,
//! stream). One generic walker, [`Block::clean`], checks a JSON value against
//! a schema, applies defaults, and reports every failure by dotted path.
//!
//! Stream values use the usual serialized form:
//!
//! ```json
//! [{"type": "subcategory", "value": {"title": "...", "author": "..."}, "id": "..."}]
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::validation::{ErrorCode, ValidationErrors, join_path};

/// Errors in a schema definition itself, caught when the schema is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("an enumeration needs at least one choice")]
    EmptyEnumeration,

    #[error("choice '{0}' is declared more than once")]
    DuplicateChoice(String),

    #[error("child block '{0}' is declared more than once")]
    DuplicateChild(String),

    #[error("block count key '{key}' does not name a declared child block (declared: {declared})")]
    UnknownBlockCountKey { key: String, declared: String },

    #[error("block count for '{name}' has min_num {min} greater than max_num {max}")]
    InvertedBlockCount { name: String, min: usize, max: usize },

    #[error("default '{0}' is not one of the available choices")]
    DefaultNotInChoices(String),
}

/// One `(value, label)` entry of an [`Enumeration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// A closed, non-empty set of allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Enumeration {
    choices: Vec<Choice>,
}

impl Enumeration {
    pub fn new(choices: Vec<Choice>) -> Result<Self, SchemaError> {
        if choices.is_empty() {
            return Err(SchemaError::EmptyEnumeration);
        }
        let mut seen = HashSet::new();
        for choice in &choices {
            if !seen.insert(choice.value.as_str()) {
                return Err(SchemaError::DuplicateChoice(choice.value.clone()));
            }
        }
        Ok(Self { choices })
    }

    /// Build from `(value, label)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, SchemaError> {
        Self::new(
            pairs
                .iter()
                .map(|(value, label)| Choice {
                    value: (*value).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
        )
    }

    pub fn contains(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c.value == value)
    }

    /// The first declared value.
    pub fn first_value(&self) -> &str {
        // Construction guarantees at least one choice.
        self.choices.first().map(|c| c.value.as_str()).unwrap_or_default()
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.choices.iter().map(|c| c.value.as_str())
    }
}

/// Min/max repetition of one child block type inside a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_num: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num: Option<usize>,
}

impl BlockCount {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min_num: Some(min),
            max_num: Some(max),
        }
    }
}

/// A named child of a struct or stream block.
#[derive(Debug, Clone, Serialize)]
pub struct NamedBlock {
    pub name: String,
    pub block: Block,
}

/// Presentation metadata carried with a struct block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A fixed set of named fields.
#[derive(Debug, Clone, Serialize)]
pub struct StructBlock {
    pub children: Vec<NamedBlock>,
    pub meta: BlockMeta,
}

impl StructBlock {
    pub fn new<N: Into<String>>(
        children: impl IntoIterator<Item = (N, Block)>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            children: named_children(children)?,
            meta: BlockMeta::default(),
        })
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.meta.template = Some(template.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.meta.icon = Some(icon.into());
        self
    }

    pub fn child(&self, name: &str) -> Option<&Block> {
        self.children.iter().find(|c| c.name == name).map(|c| &c.block)
    }
}

/// An ordered sequence of typed child blocks.
#[derive(Debug, Clone, Serialize)]
pub struct StreamBlock {
    pub children: Vec<NamedBlock>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub block_counts: BTreeMap<String, BlockCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_num: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num: Option<usize>,
}

impl StreamBlock {
    pub fn new<N: Into<String>>(
        children: impl IntoIterator<Item = (N, Block)>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            children: named_children(children)?,
            block_counts: BTreeMap::new(),
            min_num: None,
            max_num: None,
        })
    }

    /// Constrain how many `name` children the stream may hold.
    ///
    /// `name` must be a declared child; a count keyed on anything else would
    /// never match a child and so never be enforced.
    pub fn with_block_count(
        mut self,
        name: impl Into<String>,
        count: BlockCount,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if self.child(&name).is_none() {
            return Err(SchemaError::UnknownBlockCountKey {
                key: name,
                declared: self
                    .children
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        if let (Some(min), Some(max)) = (count.min_num, count.max_num)
            && min > max
        {
            return Err(SchemaError::InvertedBlockCount { name, min, max });
        }
        self.block_counts.insert(name, count);
        Ok(self)
    }

    /// Constrain the total number of children.
    pub fn with_total(mut self, min_num: Option<usize>, max_num: Option<usize>) -> Self {
        self.min_num = min_num;
        self.max_num = max_num;
        self
    }

    pub fn child(&self, name: &str) -> Option<&Block> {
        self.children.iter().find(|c| c.name == name).map(|c| &c.block)
    }
}

fn named_children<N: Into<String>>(
    children: impl IntoIterator<Item = (N, Block)>,
) -> Result<Vec<NamedBlock>, SchemaError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (name, block) in children {
        let name = name.into();
        if !seen.insert(name.clone()) {
            return Err(SchemaError::DuplicateChild(name));
        }
        out.push(NamedBlock { name, block });
    }
    Ok(out)
}

/// The field kinds a schema is built from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Char {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Text,
    Choice {
        choices: Enumeration,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    PageChooser,
    Struct(StructBlock),
    Stream(StreamBlock),
}

/// A schema node: a labelled field kind.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub label: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    fn of(label: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            label: label.into(),
            required: true,
            kind,
        }
    }

    /// Single-line text, trimmed, optionally bounded in characters.
    pub fn char(label: impl Into<String>, max_length: Option<usize>) -> Self {
        Self::of(label, BlockKind::Char { max_length })
    }

    /// Unbounded multi-line text.
    pub fn text(label: impl Into<String>) -> Self {
        Self::of(label, BlockKind::Text)
    }

    /// One value out of `choices`; a missing or null value takes `default`
    /// when given. An empty string is never defaulted.
    pub fn choice(
        label: impl Into<String>,
        choices: Enumeration,
        default: Option<String>,
    ) -> Result<Self, SchemaError> {
        if let Some(d) = &default
            && !choices.contains(d)
        {
            return Err(SchemaError::DefaultNotInChoices(d.clone()));
        }
        Ok(Self::of(label, BlockKind::Choice { choices, default }))
    }

    /// Reference to a page by id.
    pub fn page_chooser(label: impl Into<String>) -> Self {
        Self::of(label, BlockKind::PageChooser)
    }

    pub fn structure(label: impl Into<String>, block: StructBlock) -> Self {
        Self::of(label, BlockKind::Struct(block))
    }

    pub fn stream(label: impl Into<String>, block: StreamBlock) -> Self {
        Self::of(label, BlockKind::Stream(block))
    }

    /// Mark the block as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Schema as JSON, block counts included verbatim.
    pub fn describe(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Validate `value` and return its normalised form.
    ///
    /// Unknown struct keys are dropped, unset choices take their default and
    /// stream children get an `id` when they lack one. Every failure is
    /// reported, keyed by dotted path relative to this block.
    pub fn clean(&self, value: &Value) -> Result<Value, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let cleaned = self.clean_at(value, "", &mut errors);
        errors.into_result(cleaned)
    }

    fn clean_at(&self, value: &Value, path: &str, errors: &mut ValidationErrors) -> Value {
        match &self.kind {
            BlockKind::Char { max_length } => {
                let Some(text) = self.text_value(value, path, errors) else {
                    return Value::String(String::new());
                };
                if let Some(max) = max_length {
                    let len = text.chars().count();
                    if len > *max {
                        errors.add(
                            path,
                            ErrorCode::MaxLength,
                            format!(
                                "Ensure this value has at most {max} characters (it has {len})."
                            ),
                        );
                    }
                }
                Value::String(text)
            }
            BlockKind::Text => match self.text_value(value, path, errors) {
                Some(text) => Value::String(text),
                None => Value::String(String::new()),
            },
            BlockKind::Choice { choices, default } => {
                let chosen = match value {
                    Value::Null => default.clone(),
                    // An explicit blank is a cleared field, not an unset one.
                    Value::String(s) if s.is_empty() => None,
                    Value::String(s) => Some(s.clone()),
                    _ => {
                        errors.add(path, ErrorCode::Invalid, "Expected a string value.");
                        return Value::Null;
                    }
                };
                let Some(chosen) = chosen else {
                    if self.required {
                        errors.add(path, ErrorCode::Required, "This field is required.");
                    }
                    return Value::Null;
                };
                if !choices.contains(&chosen) {
                    errors.add(
                        path,
                        ErrorCode::Enumeration,
                        format!(
                            "Select a valid choice. {chosen} is not one of the available choices."
                        ),
                    );
                }
                Value::String(chosen)
            }
            BlockKind::PageChooser => match page_id(value) {
                Some(Ok(id)) => Value::String(id.to_string()),
                Some(Err(())) => {
                    errors.add(path, ErrorCode::Invalid, "Expected a page id.");
                    Value::Null
                }
                None => {
                    if self.required {
                        errors.add(path, ErrorCode::Required, "This field is required.");
                    }
                    Value::Null
                }
            },
            BlockKind::Struct(block) => clean_struct(block, value, path, errors),
            BlockKind::Stream(block) => clean_stream(block, value, path, errors),
        }
    }

    /// Shared handling for the two text kinds: type check, trim, required.
    fn text_value(&self, value: &Value, path: &str, errors: &mut ValidationErrors) -> Option<String> {
        let text = match value {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            _ => {
                errors.add(path, ErrorCode::Invalid, "Expected a string value.");
                return None;
            }
        };
        if text.is_empty() && self.required {
            errors.add(path, ErrorCode::Required, "This field is required.");
        }
        Some(text)
    }

    /// Page ids referenced anywhere inside an already-cleaned value.
    pub fn page_refs(&self, cleaned: &Value) -> Vec<(String, Uuid)> {
        let mut refs = Vec::new();
        self.collect_page_refs(cleaned, "", &mut refs);
        refs
    }

    fn collect_page_refs(&self, value: &Value, path: &str, refs: &mut Vec<(String, Uuid)>) {
        match &self.kind {
            BlockKind::PageChooser => {
                if let Some(Ok(id)) = page_id(value) {
                    refs.push((path.to_string(), id));
                }
            }
            BlockKind::Struct(block) => {
                for child in &block.children {
                    if let Some(v) = value.get(&child.name) {
                        child
                            .block
                            .collect_page_refs(v, &join_path(path, &child.name), refs);
                    }
                }
            }
            BlockKind::Stream(block) => {
                let Some(items) = value.as_array() else {
                    return;
                };
                for (i, item) in items.iter().enumerate() {
                    let child = item
                        .get("type")
                        .and_then(Value::as_str)
                        .and_then(|t| block.child(t));
                    if let (Some(child), Some(v)) = (child, item.get("value")) {
                        child.collect_page_refs(v, &join_path(path, &i.to_string()), refs);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Parse a page reference; `None` when unset.
fn page_id(value: &Value) -> Option<Result<Uuid, ()>> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(Uuid::parse_str(s).map_err(|_| ())),
        _ => Some(Err(())),
    }
}

fn clean_struct(
    block: &StructBlock,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) -> Value {
    let empty = Map::new();
    let object = match value {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => {
            errors.add(path, ErrorCode::Invalid, "Expected an object.");
            return Value::Null;
        }
    };

    let mut out = Map::new();
    for child in &block.children {
        let raw = object.get(&child.name).unwrap_or(&Value::Null);
        let cleaned = child
            .block
            .clean_at(raw, &join_path(path, &child.name), errors);
        out.insert(child.name.clone(), cleaned);
    }
    Value::Object(out)
}

fn clean_stream(
    block: &StreamBlock,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) -> Value {
    let empty = Vec::new();
    let items = match value {
        Value::Null => &empty,
        Value::Array(items) => items,
        _ => {
            errors.add(path, ErrorCode::Invalid, "Expected a list of blocks.");
            return Value::Array(Vec::new());
        }
    };

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let item_path = join_path(path, &i.to_string());
        let type_name = item.get("type").and_then(Value::as_str).unwrap_or("");
        let Some(named) = block.children.iter().find(|c| c.name == type_name) else {
            errors.add(
                &item_path,
                ErrorCode::UnknownBlock,
                format!("Unknown block type '{type_name}'."),
            );
            continue;
        };
        *counts.entry(named.name.as_str()).or_default() += 1;

        let raw = item.get("value").unwrap_or(&Value::Null);
        let cleaned = named.block.clean_at(raw, &item_path, errors);
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        out.push(serde_json::json!({
            "type": named.name,
            "value": cleaned,
            "id": id,
        }));
    }

    let total = items.len();
    if let Some(min) = block.min_num.filter(|&m| total < m) {
        errors.add(
            path,
            ErrorCode::Cardinality,
            format!("The minimum number of items is {min}."),
        );
    }
    if let Some(max) = block.max_num.filter(|&m| total > m) {
        errors.add(
            path,
            ErrorCode::Cardinality,
            format!("The maximum number of items is {max}."),
        );
    }

    for (name, count) in &block.block_counts {
        let found = counts.get(name.as_str()).copied().unwrap_or(0);
        if let Some(min) = count.min_num.filter(|&m| found < m) {
            errors.add(
                path,
                ErrorCode::Cardinality,
                format!("The minimum number of items for '{name}' is {min} (found {found})."),
            );
        }
        if let Some(max) = count.max_num.filter(|&m| found > m) {
            errors.add(
                path,
                ErrorCode::Cardinality,
                format!("The maximum number of items for '{name}' is {max} (found {found})."),
            );
        }
    }

    Value::Array(out)
}
