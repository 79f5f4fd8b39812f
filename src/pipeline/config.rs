use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::config::{
    find_default_config, load_config, AppConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILENAME,
};
use crate::pipeline::aggregate::MergePolicy;
use crate::pipeline::prompts::{
    default_prompt_files, OutputFormat, PromptPolicy, PromptSet, DEFAULT_PROMPTS_DIR,
};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a professional translator with a deep understanding of sector-specific terminology.";

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MIN_INTERVAL_SECS: f64 = 2.0;

/// Values given on the command line; each one wins over the config file.
#[derive(Clone, Debug, Default)]
pub struct PipelineOverrides {
    pub config_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub min_interval_secs: Option<f64>,
    pub output_format: Option<String>,
    pub merge_policy: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub checkpoint: Option<PathBuf>,
    pub no_autosave: bool,
    pub trace_prompts: bool,
    pub input_encoding: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub system_prompt: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(120),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ServiceSettings {
    /// Reads the key from the configured env var; `None` when unset or blank.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub config_path: PathBuf,

    pub batch_size: usize,
    pub min_interval: Duration,
    pub merge_policy: MergePolicy,
    pub policy: PromptPolicy,
    pub prompts: PromptSet,
    pub service: ServiceSettings,

    pub autosave: bool,
    pub autosave_suffix: String,
    pub checkpoint: Option<PathBuf>,
    pub trace_dir: PathBuf,
    pub trace_prompts: bool,
    pub input_encoding: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILENAME),
            batch_size: DEFAULT_BATCH_SIZE,
            min_interval: Duration::from_secs_f64(DEFAULT_MIN_INTERVAL_SECS),
            merge_policy: MergePolicy::default(),
            policy: PromptPolicy::default(),
            prompts: PromptSet::default(),
            service: ServiceSettings::default(),
            autosave: false,
            autosave_suffix: "_progress".to_string(),
            checkpoint: None,
            trace_dir: PathBuf::from("_trace"),
            trace_prompts: false,
            input_encoding: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_paths_and_args(
        input: &Path,
        output: &Path,
        overrides: PipelineOverrides,
    ) -> anyhow::Result<Self> {
        let workdir = input
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, DEFAULT_CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if overrides.config_path.is_some() {
                return Err(anyhow!("config not found: {}", p.display()));
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| workdir.join(DEFAULT_CONFIG_FILENAME));

        let output_dir = output
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| workdir.clone());
        Self::resolve(file_cfg, cfg_path, workdir, &output_dir, overrides)
    }

    /// Merges CLI overrides, file values and defaults, in that order of precedence.
    pub fn resolve(
        file_cfg: AppConfig,
        config_path: PathBuf,
        workdir: PathBuf,
        output_dir: &Path,
        overrides: PipelineOverrides,
    ) -> anyhow::Result<Self> {
        let pl = &file_cfg.pipeline;

        let batch_size = overrides
            .batch_size
            .or(pl.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        let interval_secs = overrides
            .min_interval_secs
            .or(pl.min_interval_secs)
            .unwrap_or(DEFAULT_MIN_INTERVAL_SECS);
        let min_interval = Duration::try_from_secs_f64(interval_secs).map_err(|_| {
            anyhow!("min_interval_secs must be a non-negative number of seconds (got {interval_secs})")
        })?;
        let output_format = match overrides.output_format.as_deref().or(pl.output_format.as_deref()) {
            Some(s) => OutputFormat::parse(s)?,
            None => OutputFormat::Line,
        };
        let merge_policy = match overrides.merge_policy.as_deref().or(pl.merge_policy.as_deref()) {
            Some(s) => MergePolicy::parse(s)?,
            None => MergePolicy::default(),
        };

        let defaults = PromptPolicy::default();
        let pol = &file_cfg.policy;
        let policy = PromptPolicy {
            source_lang: overrides
                .source_lang
                .clone()
                .or_else(|| pol.source_lang.clone())
                .unwrap_or(defaults.source_lang),
            target_lang: overrides
                .target_lang
                .clone()
                .or_else(|| pol.target_lang.clone())
                .unwrap_or(defaults.target_lang),
            preserve_technical_terms: pol
                .preserve_technical_terms
                .unwrap_or(defaults.preserve_technical_terms),
            abstain_on_uncertain: pol
                .abstain_on_uncertain
                .unwrap_or(defaults.abstain_on_uncertain),
            output_format,
            forbidden_substitutions: pol.forbidden_substitutions.clone(),
        };

        let sv = &file_cfg.service;
        let service_defaults = ServiceSettings::default();
        let service = ServiceSettings {
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| sv.base_url.clone())
                .unwrap_or(service_defaults.base_url),
            model: overrides
                .model
                .clone()
                .or_else(|| sv.model.clone())
                .unwrap_or(service_defaults.model),
            api_key_env: sv
                .api_key_env
                .clone()
                .unwrap_or(service_defaults.api_key_env),
            temperature: sv.temperature.unwrap_or(service_defaults.temperature),
            timeout: sv
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(service_defaults.timeout),
            system_prompt: sv
                .system_prompt
                .clone()
                .unwrap_or(service_defaults.system_prompt),
        };

        let config_dir = config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let checkpoint = overrides.checkpoint.clone().or_else(|| {
            pl.checkpoint
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| relative_to(&config_dir, s))
        });

        let trace_dir = pl.trace_dir.clone().unwrap_or_else(|| "_trace".to_string());
        let trace_dir = relative_to(output_dir, &trace_dir);
        let trace_prompts = overrides.trace_prompts || pl.trace_prompts.unwrap_or(false);
        let autosave = !overrides.no_autosave && pl.autosave.unwrap_or(true);
        let autosave_suffix = pl
            .autosave_suffix
            .clone()
            .unwrap_or_else(|| "_progress".to_string());
        let input_encoding = overrides
            .input_encoding
            .clone()
            .or_else(|| pl.input_encoding.clone());

        let prompts = PromptSet::load(&config_path, &file_cfg).context("load prompts")?;

        Ok(Self {
            workdir,
            config_path,
            batch_size,
            min_interval,
            merge_policy,
            policy,
            prompts,
            service,
            autosave,
            autosave_suffix,
            checkpoint,
            trace_dir,
            trace_prompts,
            input_encoding,
        })
    }
}

fn relative_to(base: &Path, p: &str) -> PathBuf {
    let path = PathBuf::from(p);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(DEFAULT_CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
batch_size = 50
# Minimum seconds between the starts of two service calls.
min_interval_secs = 2.0
# "line": one `Source: Target` per line, partial replies are kept.
# "json": one object keyed by entry key, a malformed reply drops the whole batch.
output_format = "line"
# Which translation wins when two batches return the same key: "last_wins" | "first_wins"
merge_policy = "last_wins"

autosave = true
autosave_suffix = "_progress"
# checkpoint = "translate.checkpoint.json"

trace_dir = "_trace"
trace_prompts = false
# input_encoding = "windows-1254"

[service]
base_url = "https://api.groq.com/openai/v1"
model = "meta-llama/llama-4-maverick-17b-128e-instruct"
api_key_env = "GROQ_API_KEY"
temperature = 0.3
timeout_secs = 120
system_prompt = "You are a professional translator with a deep understanding of sector-specific terminology."

[policy]
source_lang = "English"
target_lang = "Turkish"
preserve_technical_terms = false
abstain_on_uncertain = true

[policy.forbidden_substitutions]
# Training = "Course"

[prompts]
line = "prompts/translate_lines.txt"
json = "prompts/translate_json.txt"
"#;
