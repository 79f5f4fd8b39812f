use serde_json::Value;

use crate::error::SourceError;
use crate::ir::{is_blank, Entry, TranslationMap};

/// Field names of a record-list document: `{"<list>": [{"<key>": .., "<text>": ..}, ..]}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFields {
    pub list: String,
    pub key: String,
    pub text: String,
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            list: "data".to_string(),
            key: "_name".to_string(),
            text: "value".to_string(),
        }
    }
}

/// A JSON document holding a list of keyed text records. Everything outside the text field
/// is carried through untouched.
#[derive(Clone, Debug)]
pub struct RecordDocument {
    root: Value,
    fields: RecordFields,
}

impl RecordDocument {
    pub fn from_json(root: Value, fields: RecordFields) -> Result<Self, SourceError> {
        let obj = root.as_object().ok_or(SourceError::NotAnObject)?;
        match obj.get(&fields.list) {
            None => {
                return Err(SourceError::MissingField {
                    field: fields.list.clone(),
                })
            }
            Some(Value::Array(_)) => {}
            Some(_) => {
                return Err(SourceError::WrongType {
                    field: fields.list.clone(),
                    expected: "array",
                })
            }
        }
        Ok(Self { root, fields })
    }

    /// Quick shape check used to tell record lists apart from plain nested documents.
    #[must_use]
    pub fn looks_like(root: &Value, fields: &RecordFields) -> bool {
        root.get(&fields.list)
            .and_then(Value::as_array)
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|it| it.get(&fields.key).is_some() && it.get(&fields.text).is_some())
            })
    }

    fn records(&self) -> &[Value] {
        self.root
            .get(&self.fields.list)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records with a non-empty string key and a string text, in document order. Others are
    /// skipped.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.records()
            .iter()
            .filter_map(|rec| {
                let key = rec.get(&self.fields.key)?.as_str()?;
                let text = rec.get(&self.fields.text)?.as_str()?;
                (!key.is_empty() && !is_blank(text)).then(|| Entry::new(key, text))
            })
            .collect()
    }

    /// Copy of the document with each record's text replaced by its non-blank translation.
    /// Records without one keep their original text.
    #[must_use]
    pub fn inject(&self, map: &TranslationMap) -> Value {
        let mut out = self.root.clone();
        let Some(items) = out
            .get_mut(&self.fields.list)
            .and_then(Value::as_array_mut)
        else {
            return out;
        };
        for rec in items.iter_mut() {
            let Some(key) = rec.get(&self.fields.key).and_then(Value::as_str) else {
                continue;
            };
            let Some(t) = map.get(key).filter(|t| !is_blank(t)).cloned() else {
                continue;
            };
            if let Some(obj) = rec.as_object_mut() {
                if obj.get(&self.fields.text).is_some_and(Value::is_string) {
                    obj.insert(self.fields.text.clone(), Value::String(t));
                }
            }
        }
        out
    }
}
