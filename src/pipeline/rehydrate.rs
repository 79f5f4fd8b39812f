use crate::ir::{is_blank, Entry, TranslationMap};
use crate::tree::{tree_from_map, TextTree, TreeError};

/// Column fill: one slot per row, `None` where the aggregate has no non-blank value.
#[must_use]
pub fn fill_column(row_keys: &[String], map: &TranslationMap) -> Vec<Option<String>> {
    row_keys
        .iter()
        .map(|k| map.get(k).filter(|v| !is_blank(v)).cloned())
        .collect()
}

/// Fallback pass over a filled column: unresolved or blank slots take the row's source text.
#[must_use]
pub fn fallback_column(filled: Vec<Option<String>>, sources: &[String]) -> Vec<String> {
    filled
        .into_iter()
        .zip(sources.iter())
        .map(|(slot, src)| match slot {
            Some(v) if !is_blank(&v) => v,
            _ => src.clone(),
        })
        .collect()
}

/// Fallback pass over a keyed mapping: every entry's key ends up with a non-blank value,
/// either its translation or its own source text.
#[must_use]
pub fn with_fallback(entries: &[Entry], map: &TranslationMap) -> TranslationMap {
    let mut out = TranslationMap::new();
    for e in entries {
        let v = match map.get(&e.key) {
            Some(v) if !is_blank(v) => v.clone(),
            _ => e.source_text.clone(),
        };
        out.insert(e.key.clone(), v);
    }
    out
}

/// Tree rebuild. Without fallback the tree mirrors only the translated subset; with it,
/// every source leaf is present.
pub fn rebuild_tree(
    entries: &[Entry],
    map: &TranslationMap,
    fallback: bool,
) -> Result<TextTree, TreeError> {
    if fallback {
        return tree_from_map(entries, &with_fallback(entries, map));
    }
    let translated: TranslationMap = map
        .iter()
        .filter(|(_, v)| !is_blank(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    tree_from_map(entries, &translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn column_fill_then_fallback_covers_every_row() {
        let rows = strings(&["Cook", "Chef", "Cook", "Nurse", "Pilot"]);
        let mut map = TranslationMap::new();
        map.insert("Cook".to_string(), "Aşçı".to_string());
        map.insert("Nurse".to_string(), "  ".to_string());
        map.insert("Chef".to_string(), "Şef".to_string());

        let filled = fill_column(&rows, &map);
        assert_eq!(
            filled,
            vec![
                Some("Aşçı".to_string()),
                Some("Şef".to_string()),
                Some("Aşçı".to_string()),
                None,
                None
            ]
        );
        let out = fallback_column(filled, &rows);
        assert_eq!(out, strings(&["Aşçı", "Şef", "Aşçı", "Nurse", "Pilot"]));
        assert!(out.iter().all(|v| !v.trim().is_empty()));
    }

    #[test]
    fn tree_is_sparse_without_fallback_and_total_with_it() {
        let entries = vec![
            Entry::new("home.title", "Ana sayfa"),
            Entry::new("home.cards.courses", "Kurslar"),
            Entry::new("sidebar.exit", "Çıkış"),
        ];
        let mut map = TranslationMap::new();
        map.insert("home.cards.courses".to_string(), "Courses".to_string());
        map.insert("sidebar.exit".to_string(), "".to_string());

        let sparse = rebuild_tree(&entries, &map, false).expect("tree");
        assert_eq!(sparse.to_json(), json!({"home": {"cards": {"courses": "Courses"}}}));

        let full = rebuild_tree(&entries, &map, true).expect("tree");
        assert_eq!(
            full.to_json(),
            json!({
                "home": {"title": "Ana sayfa", "cards": {"courses": "Courses"}},
                "sidebar": {"exit": "Çıkış"}
            })
        );
    }

    #[test]
    fn keyed_fallback_uses_source_text() {
        let entries = vec![Entry::new("a", "A"), Entry::new("b", "B")];
        let mut map = TranslationMap::new();
        map.insert("a".to_string(), "x".to_string());
        let out = with_fallback(&entries, &map);
        assert_eq!(out["a"], "x");
        assert_eq!(out["b"], "B");
    }
}
