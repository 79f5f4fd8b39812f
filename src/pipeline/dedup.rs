use std::collections::HashSet;

use anyhow::anyhow;

/// Makes every value unique while keeping order. A repeat becomes `"<value> (<counterpart>)"`;
/// if that is taken too, `" (2)"`, `" (3)"`, ... is appended until the string is unused.
/// First occurrences are never changed.
pub fn make_unique_with_counterpart(
    values: &[String],
    counterparts: &[String],
) -> anyhow::Result<Vec<String>> {
    if values.len() != counterparts.len() {
        return Err(anyhow!(
            "length mismatch: {} values vs {} counterparts",
            values.len(),
            counterparts.len()
        ));
    }
    let mut seen: HashSet<String> = HashSet::with_capacity(values.len());
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for (val, cp) in values.iter().zip(counterparts) {
        let mut new_val = val.clone();
        if seen.contains(&new_val) {
            let candidate = format!("{val} ({cp})");
            let mut unique = candidate.clone();
            let mut counter = 1usize;
            while seen.contains(&unique) {
                counter += 1;
                unique = format!("{candidate} ({counter})");
            }
            new_val = unique;
        }
        seen.insert(new_val.clone());
        out.push(new_val);
    }
    Ok(out)
}

/// Uniqueness pass over a source/translation column pair. Each side borrows the other's
/// pre-pass value as its counterpart.
pub fn make_pair_unique(
    sources: &[String],
    translations: &[String],
) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let src = make_unique_with_counterpart(sources, translations)?;
    let tgt = make_unique_with_counterpart(translations, sources)?;
    Ok((src, tgt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn repeat_borrows_counterpart() {
        let out = make_unique_with_counterpart(
            &strings(&["Cook", "Chef", "Cook"]),
            &strings(&["Aşçı", "Şef", "Aşçı2"]),
        )
        .expect("dedup");
        assert_eq!(out, strings(&["Cook", "Chef", "Cook (Aşçı2)"]));
    }

    #[test]
    fn numeric_suffix_when_candidate_taken() {
        let out = make_unique_with_counterpart(
            &strings(&["Cook", "Cook", "Cook", "Cook"]),
            &strings(&["Aşçı", "Aşçı", "Aşçı", "Aşçı"]),
        )
        .expect("dedup");
        assert_eq!(
            out,
            strings(&["Cook", "Cook (Aşçı)", "Cook (Aşçı) (2)", "Cook (Aşçı) (3)"])
        );
        let unique: HashSet<&String> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn pair_pass_uses_pre_pass_values() {
        let (src, tgt) = make_pair_unique(
            &strings(&["Cook", "Kitchen Cook", "Cook"]),
            &strings(&["Aşçı", "Aşçı", "Aşçı"]),
        )
        .expect("dedup");
        assert_eq!(src, strings(&["Cook", "Kitchen Cook", "Cook (Aşçı)"]));
        assert_eq!(tgt, strings(&["Aşçı", "Aşçı (Kitchen Cook)", "Aşçı (Cook)"]));
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(make_unique_with_counterpart(&strings(&["a"]), &[]).is_err());
    }
}
