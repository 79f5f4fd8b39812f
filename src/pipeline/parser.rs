use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ir::{is_blank, Batch, TranslationMap};

use super::outcome::BatchFailure;
use super::prompts::OutputFormat;

pub const LINE_SEPARATOR: char = ':';

static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d{1,4}\s*[.)]\s+|[-*•]\s+)").expect("ordinal regex"));
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$|^\s*```[A-Za-z0-9_-]*\s*|\s*```\s*$")
        .expect("fence regex")
});

/// Parsed translations for one batch plus how many reply lines/keys were discarded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub map: TranslationMap,
    pub discarded: usize,
}

pub fn parse_reply(
    format: OutputFormat,
    reply: &str,
    batch: &Batch,
) -> Result<ParsedReply, BatchFailure> {
    match format {
        OutputFormat::Line => Ok(parse_line_reply(reply, batch)),
        OutputFormat::Json => parse_json_reply(reply, batch),
    }
}

/// Raw `key: value` pairs. Lines without a separator are skipped; a leading ordinal
/// (`3. `, `3) `) or bullet is stripped from the key.
#[must_use]
pub fn parse_line_pairs(reply: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in reply.lines() {
        let Some(pos) = line.find(LINE_SEPARATOR) else {
            continue;
        };
        let key = clean_key(&line[..pos]);
        if key.is_empty() {
            continue;
        }
        out.push((key, clean_value(&line[pos + LINE_SEPARATOR.len_utf8()..])));
    }
    out
}

/// Line mode, realigned on the batch. For each line the first separator whose left side
/// names a batch entry (by key or source text) wins, so source texts that themselves
/// contain a colon still resolve. Blank values are abstentions and are left out.
#[must_use]
pub fn parse_line_reply(reply: &str, batch: &Batch) -> ParsedReply {
    let mut parsed = ParsedReply::default();
    for line in reply.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut matched = false;
        for (pos, _) in line.match_indices(LINE_SEPARATOR) {
            let raw_left = &line[..pos];
            let value = clean_value(&line[pos + LINE_SEPARATOR.len_utf8()..]);
            let mut keys = batch.keys_for_label(&clean_key(raw_left));
            if keys.is_empty() {
                keys = batch.keys_for_label(raw_left.trim());
            }
            if keys.is_empty() {
                continue;
            }
            matched = true;
            if !is_blank(&value) {
                for k in keys {
                    parsed.map.insert(k.to_string(), value.clone());
                }
            }
            break;
        }
        if !matched {
            parsed.discarded += 1;
        }
    }
    parsed
}

/// JSON mode: after removing code fences the reply must be exactly one object. Anything
/// else discards the whole batch. Keys outside the batch and non-string or blank values
/// are ignored.
pub fn parse_json_reply(reply: &str, batch: &Batch) -> Result<ParsedReply, BatchFailure> {
    let cleaned = strip_code_fences(reply);
    if !(cleaned.starts_with('{') && cleaned.ends_with('}')) {
        return Err(BatchFailure::Parse(
            "reply is not a bare JSON object".to_string(),
        ));
    }
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|err| BatchFailure::Parse(format!("invalid JSON: {err}")))?;
    let Value::Object(obj) = value else {
        return Err(BatchFailure::Parse(
            "top-level JSON value is not an object".to_string(),
        ));
    };

    let mut parsed = ParsedReply::default();
    for (k, v) in obj {
        let key = k.trim();
        match v {
            Value::String(s) if batch.contains_key(key) => {
                let s = s.trim();
                if !s.is_empty() {
                    parsed.map.insert(key.to_string(), s.to_string());
                }
            }
            _ => parsed.discarded += 1,
        }
    }
    Ok(parsed)
}

/// Removes markdown code-fence lines (```` ``` ````, ```` ```json ````) and surrounding
/// whitespace.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    FENCE_RE.replace_all(text.trim(), "").trim().to_string()
}

fn clean_key(raw: &str) -> String {
    let stripped = ORDINAL_RE.replace(raw, "");
    stripped
        .trim()
        .trim_matches(|c| c == '"' || c == '*' || c == '`')
        .trim()
        .to_string()
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '*' || c == '`')
        .trim()
        .to_string()
}
