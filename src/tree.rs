use serde_json::{Map, Value};
use thiserror::Error;

use crate::ir::{Entry, TranslationMap};

pub const PATH_SEPARATOR: char = '.';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("path conflict at `{path}`: `{segment}` is already a text leaf")]
    PathConflict { path: String, segment: String },
    #[error("empty key in path `{path}`")]
    EmptyPath { path: String },
    #[error("document root must be a JSON object")]
    NotAnObject,
}

/// Nested document whose leaves are strings. Node children keep document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextTree {
    Leaf(String),
    Node(Vec<(String, TextTree)>),
}

impl Default for TextTree {
    fn default() -> Self {
        TextTree::Node(Vec::new())
    }
}

impl TextTree {
    /// Builds a tree from JSON, keeping only objects and string leaves.
    pub fn from_json(value: &Value) -> Result<Self, TreeError> {
        match value {
            Value::Object(map) => Ok(Self::from_object(map)),
            _ => Err(TreeError::NotAnObject),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Self {
        let mut children: Vec<(String, TextTree)> = Vec::with_capacity(map.len());
        for (k, v) in map {
            match v {
                Value::String(s) => children.push((k.clone(), TextTree::Leaf(s.clone()))),
                Value::Object(inner) => children.push((k.clone(), Self::from_object(inner))),
                _ => {}
            }
        }
        TextTree::Node(children)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            TextTree::Leaf(s) => Value::String(s.clone()),
            TextTree::Node(children) => {
                let mut map = Map::with_capacity(children.len());
                for (k, v) in children {
                    map.insert(k.clone(), v.to_json());
                }
                Value::Object(map)
            }
        }
    }

    /// Depth-first leaves as `(dotted.path, text)` entries, in document order.
    #[must_use]
    pub fn flatten(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        flatten_into(self, None, &mut out);
        out
    }

    /// [`TextTree::flatten`], rejecting documents whose paths cannot be rebuilt: an empty
    /// key, or a path that descends through a text leaf (`errors` next to `errors.required`).
    pub fn flatten_checked(&self) -> Result<Vec<Entry>, TreeError> {
        let entries = self.flatten();
        TextTree::unflatten(entries.iter().map(|e| (e.key.as_str(), e.source_text.as_str())))?;
        Ok(entries)
    }

    /// Rebuilds a (possibly sparse) tree from dotted paths. Insertion order follows
    /// `items`, so rebuilding from [`TextTree::flatten`] output preserves the original order.
    pub fn unflatten<'a, I>(items: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut root = TextTree::default();
        for (path, text) in items {
            root.insert_path(path, text)?;
        }
        Ok(root)
    }

    pub fn insert_path(&mut self, path: &str, text: &str) -> Result<(), TreeError> {
        let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
        let empty = || TreeError::EmptyPath {
            path: path.to_string(),
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(empty());
        }
        let Some((last, parents)) = segments.split_last() else {
            return Err(empty());
        };

        let TextTree::Node(root) = self else {
            return Err(TreeError::NotAnObject);
        };
        let mut children = root;
        for seg in parents {
            children = child_children_mut(children, seg).ok_or_else(|| TreeError::PathConflict {
                path: path.to_string(),
                segment: (*seg).to_string(),
            })?;
        }

        match children.iter_mut().find(|(k, _)| k == last) {
            Some((_, TextTree::Node(_))) => Err(TreeError::PathConflict {
                path: path.to_string(),
                segment: (*last).to_string(),
            }),
            Some((_, slot)) => {
                *slot = TextTree::Leaf(text.to_string());
                Ok(())
            }
            None => {
                children.push(((*last).to_string(), TextTree::Leaf(text.to_string())));
                Ok(())
            }
        }
    }
}

/// Children of the node named `seg`, creating it if absent. `None` when `seg` is a leaf.
fn child_children_mut<'a>(
    children: &'a mut Vec<(String, TextTree)>,
    seg: &str,
) -> Option<&'a mut Vec<(String, TextTree)>> {
    let pos = match children.iter().position(|(k, _)| k == seg) {
        Some(p) => p,
        None => {
            children.push((seg.to_string(), TextTree::default()));
            children.len() - 1
        }
    };
    match &mut children[pos].1 {
        TextTree::Node(inner) => Some(inner),
        TextTree::Leaf(_) => None,
    }
}

fn flatten_into(tree: &TextTree, prefix: Option<&str>, out: &mut Vec<Entry>) {
    match tree {
        TextTree::Leaf(s) => out.push(Entry::new(prefix.unwrap_or_default(), s.clone())),
        TextTree::Node(children) => {
            for (k, v) in children {
                let path = match prefix {
                    None => k.clone(),
                    Some(p) => format!("{p}{PATH_SEPARATOR}{k}"),
                };
                flatten_into(v, Some(path.as_str()), out);
            }
        }
    }
}

/// Tree rebuild over an aggregate mapping, in `order` where given (source order), then any
/// remaining keys.
pub fn tree_from_map(order: &[Entry], map: &TranslationMap) -> Result<TextTree, TreeError> {
    let mut root = TextTree::default();
    let mut placed: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for e in order {
        if let Some(v) = map.get(&e.key) {
            if placed.insert(e.key.as_str()) {
                root.insert_path(&e.key, v)?;
            }
        }
    }
    for (k, v) in map {
        if placed.insert(k.as_str()) {
            root.insert_path(k, v)?;
        }
    }
    Ok(root)
}
