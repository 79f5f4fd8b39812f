use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser, ValueEnum};
use serde_json::Value;

use label_translator::error::SourceError;
use label_translator::ir::{is_blank, Entry, TranslationMap};
use label_translator::models::{OpenAiCompatClient, OpenAiCompatConfig};
use label_translator::pipeline::dedup::make_pair_unique;
use label_translator::pipeline::rehydrate::{fallback_column, fill_column, rebuild_tree};
use label_translator::pipeline::{
    init_default_config, PipelineConfig, PipelineOverrides, RunReport, TranslationClient,
    TranslatorPipeline,
};
use label_translator::progress::ConsoleProgress;
use label_translator::records::{RecordDocument, RecordFields};
use label_translator::table::Table;
use label_translator::textio::{read_text_file, write_text_file};
use label_translator::throttle::Throttle;
use label_translator::tree::TextTree;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Topology {
    /// Pick by extension (.csv = table) and JSON shape (record list vs nested tree)
    Auto,
    Table,
    Tree,
    Records,
}

#[derive(Parser, Debug)]
#[command(name = "label-translator")]
#[command(about = "Batch-translate CSV columns and JSON label files through an OpenAI-compatible chat API", long_about = None)]
struct Args {
    /// Generate default config + prompt files, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config/prompt files (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite existing config/prompt files when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .csv or .json
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (default: <input_stem>_translated.<ext>)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Topology::Auto)]
    topology: Topology,

    /// Source column of a CSV input
    #[arg(long)]
    column: Option<String>,

    /// Name of the appended translation column (default: <column>_<target_lang>)
    #[arg(long)]
    translated_column: Option<String>,

    /// Make the source and translated columns unique, each borrowing the other as a suffix
    #[arg(long)]
    unique: bool,

    /// Array field of a record-list JSON
    #[arg(long, default_value = "data")]
    record_list: String,

    /// Key field of each record
    #[arg(long, default_value = "_name")]
    record_key: String,

    /// Text field of each record
    #[arg(long, default_value = "value")]
    record_text: String,

    /// Config file path (default: search for label-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reply format requested from the model: line | json
    #[arg(long)]
    format: Option<String>,

    /// Entries per request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Minimum seconds between request starts
    #[arg(long, value_name = "SECS")]
    interval: Option<f64>,

    /// last_wins | first_wins
    #[arg(long)]
    merge_policy: Option<String>,

    #[arg(long)]
    source_lang: Option<String>,

    #[arg(long)]
    target_lang: Option<String>,

    /// Model identifier sent to the service
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible API base URL (e.g. https://openrouter.ai/api/v1)
    #[arg(long)]
    base_url: Option<String>,

    /// Persist progress here after every batch and resume from it when it matches the input
    #[arg(long, value_name = "JSON")]
    checkpoint: Option<PathBuf>,

    /// Do not write <output_stem>_progress.<ext> after every batch
    #[arg(long)]
    no_autosave: bool,

    /// Write each batch's prompt and reply to the trace directory
    #[arg(long)]
    trace: bool,

    /// Encoding of inputs without a BOM (e.g. windows-1254)
    #[arg(long)]
    encoding: Option<String>,

    /// Exit with an error when any batch failed
    #[arg(long)]
    strict: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

enum Source {
    Table { table: Table, column: String },
    Tree(TextTree),
    Records(RecordDocument),
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(input) = args.input.clone() else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!(
            "\n\nUSAGE:\n  label-translator jobs.csv --column \"Job Titles_En\"\n  label-translator translation.json --format json --target-lang Azerbaijani\n\nTIPS:\n  - The API key is read from GROQ_API_KEY (or [service].api_key_env); a .env file is loaded.\n  - Default config search: label-translator.toml (upwards), or set LABEL_TRANSLATOR_CONFIG.\n"
        );
        return Ok(());
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| sibling_with_suffix(&input, &input, "_translated"));

    let cfg = PipelineConfig::from_paths_and_args(
        &input,
        &output,
        PipelineOverrides {
            config_path: args.config.clone(),
            batch_size: args.batch_size,
            min_interval_secs: args.interval,
            output_format: args.format.clone(),
            merge_policy: args.merge_policy.clone(),
            source_lang: args.source_lang.clone(),
            target_lang: args.target_lang.clone(),
            model: args.model.clone(),
            base_url: args.base_url.clone(),
            checkpoint: args.checkpoint.clone(),
            no_autosave: args.no_autosave,
            trace_prompts: args.trace,
            input_encoding: args.encoding.clone(),
        },
    )
    .context("build config")?;

    progress.info(format!("Read: {}", input.display()));
    let source = load_source(&args, &input, cfg.input_encoding.as_deref())?;
    let entries = source_entries(&source)?;
    if entries.is_empty() {
        progress.warn("nothing to translate");
    }

    let api_key = cfg.service.api_key();
    if api_key.is_none() {
        return Err(anyhow!(
            "missing API key: set {} (environment or .env)",
            cfg.service.api_key_env
        ));
    }
    let backend = OpenAiCompatClient::new(OpenAiCompatConfig {
        name: cfg.service.model.clone(),
        base_url: cfg.service.base_url.clone(),
        api_key,
        timeout: cfg.service.timeout,
    })?;
    let client = TranslationClient::new(backend, &cfg.service, Throttle::new(cfg.min_interval));

    let progress_path = sibling_with_suffix(&output, &input, &cfg.autosave_suffix);
    let autosave = cfg.autosave;
    let translated_column = args
        .translated_column
        .clone()
        .unwrap_or_else(|| match &source {
            Source::Table { column, .. } => format!("{column}_{}", cfg.policy.target_lang),
            _ => String::new(),
        });
    progress.info(format!(
        "Language: {} -> {}",
        cfg.policy.source_lang, cfg.policy.target_lang
    ));

    let mut pipeline = TranslatorPipeline::new(cfg, progress, client);
    let report = pipeline.run(&entries, |map| {
        if !autosave {
            return Ok(());
        }
        write_partial(&source, &entries, map, &progress_path, &translated_column)
    })?;

    write_final(&source, &entries, &report, &output, &translated_column, args.unique)?;
    pipeline
        .progress()
        .info(format!("Write output: {}", output.display()));

    if args.strict && report.failed() > 0 {
        return Err(anyhow!(
            "{} of {} batches failed",
            report.failed(),
            report.outcomes.len()
        ));
    }
    Ok(())
}

fn load_source(args: &Args, input: &Path, encoding: Option<&str>) -> anyhow::Result<Source> {
    let is_csv = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let topology = match args.topology {
        Topology::Auto if is_csv => Topology::Table,
        t => t,
    };
    if topology == Topology::Table {
        let table = Table::read(input, encoding)?;
        let column = match args.column.clone() {
            Some(c) => c,
            None => {
                return Err(anyhow!(
                    "table input needs --column (available: {})",
                    table.headers.join(", ")
                ))
            }
        };
        // Fail on a wrong column before anything is sent.
        table.column_index(&column)?;
        return Ok(Source::Table { table, column });
    }

    let text = read_text_file(input, encoding)?;
    let root: Value = serde_json::from_str(&text)
        .with_context(|| format!("parse json: {}", input.display()))?;
    let fields = RecordFields {
        list: args.record_list.clone(),
        key: args.record_key.clone(),
        text: args.record_text.clone(),
    };
    let records = match topology {
        Topology::Records => true,
        Topology::Tree => false,
        _ => RecordDocument::looks_like(&root, &fields),
    };
    if records {
        Ok(Source::Records(RecordDocument::from_json(root, fields)?))
    } else {
        Ok(Source::Tree(TextTree::from_json(&root)?))
    }
}

/// Entries of the source. Shape problems surface here, before the client exists.
fn source_entries(source: &Source) -> anyhow::Result<Vec<Entry>> {
    Ok(match source {
        Source::Table { table, column } => table.column_entries(column)?,
        Source::Tree(tree) => tree.flatten_checked().map_err(SourceError::from)?,
        Source::Records(doc) => doc.entries(),
    })
}

/// Progress artifact: translations so far, without the fallback pass. Same shape as the
/// final output.
fn write_partial(
    source: &Source,
    entries: &[Entry],
    map: &TranslationMap,
    path: &Path,
    translated_column: &str,
) -> anyhow::Result<()> {
    match source {
        Source::Table { table, column } => {
            let keys = table.column(column)?;
            let filled: Vec<String> = fill_column(&keys, map)
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect();
            let mut t = table.clone();
            t.set_column(translated_column, filled)?;
            t.write(path)
        }
        Source::Tree(_) => write_json(&rebuild_tree(entries, map, false)?.to_json(), path),
        Source::Records(doc) => write_json(&doc.inject(map), path),
    }
}

fn write_final(
    source: &Source,
    entries: &[Entry],
    report: &RunReport,
    output: &Path,
    translated_column: &str,
    unique: bool,
) -> anyhow::Result<()> {
    let map = &report.translations;
    match source {
        Source::Table { table, column } => {
            let keys = table.column(column)?;
            let mut translated = fallback_column(fill_column(&keys, map), &keys);
            let mut t = table.clone();
            if unique {
                let sources = unique_pass(&keys, &mut translated)?;
                let idx = t.column_index(column)?;
                t.set_column_at(idx, sources)?;
            }
            t.set_column(translated_column, translated)?;
            t.write(output)
        }
        Source::Tree(_) => write_json(&rebuild_tree(entries, map, true)?.to_json(), output),
        Source::Records(doc) => write_json(&doc.inject(map), output),
    }
}

/// Runs the pair uniqueness pass over rows with a non-blank source; blank rows are left as is.
fn unique_pass(keys: &[String], translated: &mut [String]) -> anyhow::Result<Vec<String>> {
    let rows: Vec<usize> = (0..keys.len()).filter(|&i| !is_blank(&keys[i])).collect();
    let src: Vec<String> = rows.iter().map(|&i| keys[i].clone()).collect();
    let tgt: Vec<String> = rows.iter().map(|&i| translated[i].clone()).collect();
    let (src, tgt) = make_pair_unique(&src, &tgt)?;
    let mut sources = keys.to_vec();
    for ((i, s), t) in rows.into_iter().zip(src).zip(tgt) {
        sources[i] = s;
        translated[i] = t;
    }
    Ok(sources)
}

fn write_json(value: &Value, path: &Path) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("serialize json")?;
    json.push('\n');
    write_text_file(path, &json)
}

/// `<dir of base>/<stem of base><suffix>.<ext of ext_from>`
fn sibling_with_suffix(base: &Path, ext_from: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = ext_from
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("json");
    base.with_file_name(format!("{stem}{suffix}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["label-translator", "in"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("args")
    }

    fn report(pairs: &[(&str, &str)]) -> RunReport {
        RunReport {
            outcomes: Vec::new(),
            translations: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            elapsed_secs: 0.0,
        }
    }

    #[test]
    fn tree_with_colliding_paths_fails_before_translation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("labels.json");
        write_text_file(&input, r#"{"errors": "Errors", "errors.required": "Required"}"#)
            .expect("write");

        let source = load_source(&args(&[]), &input, None).expect("load");
        let err = source_entries(&source).expect_err("conflict");
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::Paths(_))
        ));

        write_text_file(&input, r#"{"a": {"": "x"}}"#).expect("write");
        let source = load_source(&args(&[]), &input, None).expect("load");
        assert!(source_entries(&source).is_err());
    }

    #[test]
    fn unique_table_flow_rewrites_the_source_column_found_case_insensitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("jobs.csv");
        write_text_file(&input, "id,Job Titles_En\n1,Cook\n2,Cook\n3,Chef\n").expect("write");
        let a = args(&["--column", "job titles_en", "--unique"]);

        let source = load_source(&a, &input, None).expect("load");
        let entries = source_entries(&source).expect("entries");
        assert_eq!(entries.len(), 3);

        let partial = dir.path().join("jobs_translated_progress.csv");
        let map: TranslationMap = report(&[("Cook", "Aşçı")]).translations;
        write_partial(&source, &entries, &map, &partial, "Job Titles_Tr").expect("partial");
        let t = Table::read(&partial, None).expect("read partial");
        assert_eq!(t.headers, vec!["id", "Job Titles_En", "Job Titles_Tr"]);
        assert_eq!(t.column("Job Titles_Tr").expect("col"), vec!["Aşçı", "Aşçı", ""]);

        let output = dir.path().join("jobs_translated.csv");
        let done = report(&[("Cook", "Aşçı"), ("Chef", "Şef")]);
        write_final(&source, &entries, &done, &output, "Job Titles_Tr", true).expect("final");
        let t = Table::read(&output, None).expect("read final");
        assert_eq!(t.headers, vec!["id", "Job Titles_En", "Job Titles_Tr"]);
        assert_eq!(
            t.column("Job Titles_En").expect("col"),
            vec!["Cook", "Cook (Aşçı)", "Chef"]
        );
        assert_eq!(
            t.column("Job Titles_Tr").expect("col"),
            vec!["Aşçı", "Aşçı (Cook)", "Şef"]
        );
    }
}
