use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::textio::read_text_file;

pub const DEFAULT_CONFIG_FILENAME: &str = "label-translator.toml";
pub const CONFIG_ENV_VAR: &str = "LABEL_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Minimum gap between the starts of two consecutive service calls.
    #[serde(default)]
    pub min_interval_secs: Option<f64>,
    /// "line" or "json".
    #[serde(default)]
    pub output_format: Option<String>,
    /// "last_wins" or "first_wins".
    #[serde(default)]
    pub merge_policy: Option<String>,

    /// Write `<stem>_progress.<ext>` after every batch.
    #[serde(default)]
    pub autosave: Option<bool>,
    #[serde(default)]
    pub autosave_suffix: Option<String>,
    #[serde(default)]
    pub checkpoint: Option<String>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,

    /// Encoding label for inputs without a BOM (e.g. "windows-1254").
    #[serde(default)]
    pub input_encoding: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the env var holding the API key (never the key itself).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PolicySection {
    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub preserve_technical_terms: Option<bool>,
    #[serde(default)]
    pub abstain_on_uncertain: Option<bool>,
    #[serde(default)]
    pub forbidden_substitutions: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub json: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = read_text_file(path, None).context("read config")?;
    parse_config(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_optional() {
        let cfg = parse_config("").expect("empty config");
        assert!(cfg.pipeline.batch_size.is_none());
        assert!(cfg.policy.forbidden_substitutions.is_empty());
    }

    #[test]
    fn parses_all_sections() {
        let text = r#"
[pipeline]
batch_size = 150
min_interval_secs = 5.0
output_format = "json"
merge_policy = "first_wins"

[service]
model = "llama3-70b-8192"
api_key_env = "MY_KEY"

[policy]
target_lang = "Azerbaijani"
preserve_technical_terms = true

[policy.forbidden_substitutions]
Training = "Course"

[prompts]
json = "prompts/custom.txt"
"#;
        let cfg = parse_config(text).expect("config");
        assert_eq!(cfg.pipeline.batch_size, Some(150));
        assert_eq!(cfg.pipeline.min_interval_secs, Some(5.0));
        assert_eq!(cfg.pipeline.merge_policy.as_deref(), Some("first_wins"));
        assert_eq!(cfg.service.api_key_env.as_deref(), Some("MY_KEY"));
        assert_eq!(cfg.policy.preserve_technical_terms, Some(true));
        assert_eq!(
            cfg.policy.forbidden_substitutions.get("Training").map(String::as_str),
            Some("Course")
        );
        assert_eq!(cfg.prompts.json.as_deref(), Some("prompts/custom.txt"));
        assert!(cfg.prompts.line.is_none());
    }

    #[test]
    fn finds_config_in_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILENAME), "").expect("write");
        let found = find_file_upwards(&nested, DEFAULT_CONFIG_FILENAME, 4).expect("found");
        assert_eq!(found, dir.path().join(DEFAULT_CONFIG_FILENAME));
        assert!(find_file_upwards(&nested, DEFAULT_CONFIG_FILENAME, 1).is_none());
    }
}
