use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Deepest nesting accepted for a block tree.
pub const MAX_BLOCK_DEPTH: usize = 32;

/// Free-form page properties, stored as a JSON object.
pub type Properties = Map<String, Value>;

/// A typed, recursively nestable unit of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ContentBlock>>,
}

impl ContentBlock {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            data: Map::new(),
            children: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<ContentBlock>) -> Self {
        self.children = Some(children);
        self
    }
}

/// Checks the shape of a block tree before it is persisted.
///
/// Every block needs a non-empty id and type, ids must be unique across the
/// whole tree, and nesting may not exceed [`MAX_BLOCK_DEPTH`].
pub fn validate_blocks(blocks: &[ContentBlock]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut stack: Vec<(&ContentBlock, usize)> = blocks.iter().map(|b| (b, 1)).collect();

    while let Some((block, depth)) = stack.pop() {
        if depth > MAX_BLOCK_DEPTH {
            return Err(Error::validation(format!(
                "content blocks cannot nest deeper than {MAX_BLOCK_DEPTH} levels"
            )));
        }
        if block.id.trim().is_empty() {
            return Err(Error::validation("content block id cannot be empty"));
        }
        if block.kind.trim().is_empty() {
            return Err(Error::validation(format!(
                "content block '{}' has an empty type",
                block.id
            )));
        }
        if !seen.insert(block.id.as_str()) {
            return Err(Error::validation(format!(
                "duplicate content block id '{}'",
                block.id
            )));
        }
        if let Some(children) = &block.children {
            stack.extend(children.iter().map(|c| (c, depth + 1)));
        }
    }

    Ok(())
}

/// Parses untrusted JSON into a validated block tree.
pub fn parse_blocks(value: Value) -> Result<Vec<ContentBlock>> {
    let blocks: Vec<ContentBlock> = serde_json::from_value(value)
        .map_err(|e| Error::validation(format!("malformed content: {e}")))?;
    validate_blocks(&blocks)?;
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_blocks() {
        let blocks = parse_blocks(json!([
            {"id": "a", "type": "heading", "data": {"text": "Intro", "level": 1}},
            {"id": "b", "type": "list", "data": {}, "children": [
                {"id": "c", "type": "item", "data": {"text": "one"}}
            ]}
        ]))
        .unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, "heading");
        assert_eq!(blocks[1].children.as_ref().unwrap()[0].id, "c");
    }

    #[test]
    fn test_rejects_non_object_data() {
        let err = parse_blocks(json!([{"id": "a", "type": "p", "data": "text"}])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_rejects_missing_type() {
        assert!(parse_blocks(json!([{"id": "a", "data": {}}])).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids_across_levels() {
        let blocks = vec![
            ContentBlock::new("a", "list")
                .with_children(vec![ContentBlock::new("a", "item")]),
        ];
        assert!(matches!(validate_blocks(&blocks), Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_empty_id_and_type() {
        assert!(validate_blocks(&[ContentBlock::new("", "p")]).is_err());
        assert!(validate_blocks(&[ContentBlock::new("x", " ")]).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut block = ContentBlock::new("leaf", "p");
        for i in 0..MAX_BLOCK_DEPTH {
            block = ContentBlock::new(format!("n{i}"), "group").with_children(vec![block]);
        }
        assert!(validate_blocks(&[block]).is_err());
    }

    #[test]
    fn test_serializes_type_tag_and_omits_missing_children() {
        let block = ContentBlock::new("a", "paragraph").with_data("text", "hi");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value, json!({"id": "a", "type": "paragraph", "data": {"text": "hi"}}));
    }
}
