use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{AppConfig, PromptsSection};
use crate::ir::{collapse_whitespace, Batch};
use crate::textio::read_text_file;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_LINE_PROMPT: &str = "translate_lines.txt";
pub const DEFAULT_JSON_PROMPT: &str = "translate_json.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One `Source: Target` pair per line.
    Line,
    /// One JSON object keyed by entry key.
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "lines" => Ok(Self::Line),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown output format: {other} (expected line|json)")),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PromptPolicy {
    pub source_lang: String,
    pub target_lang: String,
    pub preserve_technical_terms: bool,
    pub abstain_on_uncertain: bool,
    pub output_format: OutputFormat,
    /// word -> required replacement
    pub forbidden_substitutions: BTreeMap<String, String>,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            source_lang: "English".to_string(),
            target_lang: "Turkish".to_string(),
            preserve_technical_terms: false,
            abstain_on_uncertain: true,
            output_format: OutputFormat::Line,
            forbidden_substitutions: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub line: String,
    pub json: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            line: DEFAULT_LINE_PROMPT_TEXT.to_string(),
            json: DEFAULT_JSON_PROMPT_TEXT.to_string(),
        }
    }
}

impl PromptSet {
    /// Templates configured under `[prompts]` are read relative to the config file;
    /// unset keys use the built-in text.
    pub fn load(config_path: &Path, cfg: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let p = &cfg.prompts;
        let defaults = Self::default();
        Ok(Self {
            line: read_prompt(config_dir, p, "line")?.unwrap_or(defaults.line),
            json: read_prompt(config_dir, p, "json")?.unwrap_or(defaults.json),
        })
    }

    #[must_use]
    pub fn template_for(&self, format: OutputFormat) -> &str {
        match format {
            OutputFormat::Line => &self.line,
            OutputFormat::Json => &self.json,
        }
    }
}

fn read_prompt(
    config_dir: &Path,
    p: &PromptsSection,
    key: &str,
) -> anyhow::Result<Option<String>> {
    let configured = match key {
        "line" => p.line.clone(),
        "json" => p.json.clone(),
        other => return Err(anyhow!("unknown prompt key: {other}")),
    };
    let Some(path) = configured.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let mut p = PathBuf::from(path);
    if p.is_relative() {
        p = config_dir.join(&p);
    }
    if !p.exists() {
        return Err(anyhow!(
            "prompt file not found for {key}: {} (run: label-translator --init-config)",
            p.display()
        ));
    }
    let text = read_text_file(&p, None).context("read prompt")?;
    Ok(Some(text))
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

/// Numbered enumeration of the batch. Line mode lists the source texts (the reply echoes
/// them left of the colon); JSON mode lists `"key": "text"` pairs so the reply is keyed by
/// entry key.
#[must_use]
pub fn render_items(batch: &Batch, format: OutputFormat) -> String {
    batch
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| match format {
            OutputFormat::Line => format!("{}. {}", i + 1, collapse_whitespace(&e.source_text)),
            OutputFormat::Json => format!(
                "{}. {}: {}",
                i + 1,
                json_string(&e.key),
                json_string(&e.source_text)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn render_rules(policy: &PromptPolicy) -> String {
    let mut rules: Vec<String> = Vec::new();
    rules.push("- Do NOT include any additional text or explanations.".to_string());
    match policy.output_format {
        OutputFormat::Line => {
            rules.push(
                "- Copy the item text left of the colon exactly as given; do not renumber it."
                    .to_string(),
            );
        }
        OutputFormat::Json => {
            rules.push(
                "- Do not add keys, commentary, or markdown (e.g. ```json). Output only the JSON object."
                    .to_string(),
            );
        }
    }
    if policy.preserve_technical_terms {
        rules.push(
            "- If an item is a programming language, framework, tool, or software product, do NOT translate it (leave it unchanged)."
                .to_string(),
        );
    }
    if policy.abstain_on_uncertain {
        match policy.output_format {
            OutputFormat::Line => rules.push(
                "- If you are not sure about a translation, leave it blank (keep the item and the colon)."
                    .to_string(),
            ),
            OutputFormat::Json => rules.push(
                "- If you are not sure about a translation, use an empty string as its value."
                    .to_string(),
            ),
        }
    }
    for (from, to) in &policy.forbidden_substitutions {
        rules.push(format!(
            "- Do not use the word \"{from}\" in translations; use \"{to}\" instead."
        ));
    }
    rules.join("\n")
}

/// Renders one batch into the user prompt for the configured output format.
#[must_use]
pub fn build_batch_prompt(batch: &Batch, policy: &PromptPolicy, prompts: &PromptSet) -> String {
    let items = render_items(batch, policy.output_format);
    let rules = render_rules(policy);
    render_template(
        prompts.template_for(policy.output_format),
        &[
            ("source_lang", &policy.source_lang),
            ("target_lang", &policy.target_lang),
            ("rules", &rules),
            ("count", &batch.len().to_string()),
            ("items", &items),
        ],
    )
}

fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_LINE_PROMPT, DEFAULT_LINE_PROMPT_TEXT),
        (DEFAULT_JSON_PROMPT, DEFAULT_JSON_PROMPT_TEXT),
    ]
}

pub const DEFAULT_LINE_PROMPT_TEXT: &str = r#"Below is a list of {{count}} {{source_lang}} items. Translate each item into {{target_lang}} using the wording that is widely recognized by native {{target_lang}} speakers.

For each item, output exactly one line in the following format:
{{source_lang}} item: {{target_lang}} translation

For example:
Software Engineer: <{{target_lang}} translation of Software Engineer>

Rules:
{{rules}}

If there is no direct translation, provide the closest equivalent.

Items:
{{items}}"#;

pub const DEFAULT_JSON_PROMPT_TEXT: &str = r#"Translate the {{source_lang}} strings below into natural, context-aware {{target_lang}}.

Output a single valid JSON object mapping each key to its {{target_lang}} translation. Example output:
{
  "homePage.welcome": "<{{target_lang}} translation>",
  "sidebar.homePage": "<{{target_lang}} translation>"
}

Rules:
{{rules}}

Strings to translate ({{count}} "key": "text" pairs):
{{items}}"#;
