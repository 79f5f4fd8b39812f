use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{Batch, Entry, TranslationMap};
use crate::models::{ChatBackend, ChatRequest};
use crate::progress::ConsoleProgress;
use crate::throttle::{Clock, SystemClock, Throttle};

use super::aggregate::Aggregator;
use super::checkpoint::{source_digest, Checkpoint};
use super::chunker::chunk_entries;
use super::config::ServiceSettings;
use super::outcome::{BatchFailure, BatchOutcome, BatchStatus, RunReport};
use super::parser::parse_reply;
use super::prompts::build_batch_prompt;
use super::trace::TraceWriter;
use super::PipelineConfig;

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think regex"));

/// One paced call per batch against a chat backend.
pub struct TranslationClient<B: ChatBackend, C: Clock = SystemClock> {
    backend: B,
    throttle: Throttle<C>,
    model: String,
    system_prompt: String,
    temperature: f32,
}

impl<B: ChatBackend> TranslationClient<B, SystemClock> {
    pub fn new(backend: B, service: &ServiceSettings, throttle: Throttle) -> Self {
        Self::with_throttle(backend, service, throttle)
    }
}

impl<B: ChatBackend, C: Clock> TranslationClient<B, C> {
    pub fn with_throttle(backend: B, service: &ServiceSettings, throttle: Throttle<C>) -> Self {
        Self {
            backend,
            throttle,
            model: service.model.clone(),
            system_prompt: service.system_prompt.clone(),
            temperature: service.temperature,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn clock(&self) -> &C {
        self.throttle.clock()
    }

    /// Sends one prompt. The interval is enforced whether the call succeeds or not.
    pub fn translate(&mut self, user_prompt: &str) -> Result<String, BatchFailure> {
        let request = ChatRequest::new(
            self.model.clone(),
            Some(self.system_prompt.as_str()),
            user_prompt,
            Some(self.temperature),
        );
        let backend = &mut self.backend;
        let reply = self.throttle.pace(|| backend.complete(&request));
        reply
            .map(|text| cleanup_model_text(&text))
            .map_err(|e| BatchFailure::Transport(format!("{e:#}")))
    }
}

/// Drops reasoning blocks some models prepend to the answer.
fn cleanup_model_text(text: &str) -> String {
    THINK_RE.replace_all(text, "").trim().to_string()
}

pub struct TranslatorPipeline<B: ChatBackend, C: Clock = SystemClock> {
    cfg: PipelineConfig,
    progress: ConsoleProgress,
    trace: TraceWriter,
    client: TranslationClient<B, C>,
}

impl<B: ChatBackend, C: Clock> TranslatorPipeline<B, C> {
    pub fn new(cfg: PipelineConfig, progress: ConsoleProgress, client: TranslationClient<B, C>) -> Self {
        let trace = match TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_prompts) {
            Ok(t) => t,
            Err(e) => {
                progress.warn(format!("trace disabled: {e:#}"));
                TraceWriter::disabled()
            }
        };
        Self {
            cfg,
            progress,
            trace,
            client,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn progress(&self) -> &ConsoleProgress {
        &self.progress
    }

    pub fn client(&self) -> &TranslationClient<B, C> {
        &self.client
    }

    /// Translates `entries` batch by batch. Batch failures are logged and recorded in the
    /// report; only configuration and checkpoint I/O errors abort the run. `on_batch` sees
    /// the aggregate mapping after every batch (used for incremental saves).
    pub fn run(
        &mut self,
        entries: &[Entry],
        mut on_batch: impl FnMut(&TranslationMap) -> anyhow::Result<()>,
    ) -> anyhow::Result<RunReport> {
        let t0 = self.client.clock().now();
        let batches = chunk_entries(entries, self.cfg.batch_size)?;
        let total = batches.len();
        self.progress.info(format!(
            "{} entries in {} batches (batch_size={}, format={}, model={})",
            entries.len(),
            total,
            self.cfg.batch_size,
            self.cfg.policy.output_format.as_str(),
            self.client.model
        ));

        let digest = source_digest(entries);
        let mut checkpoint = Checkpoint::new(digest.clone(), self.cfg.batch_size);
        let mut aggregator = Aggregator::new(self.cfg.merge_policy);
        if let Some(path) = self.cfg.checkpoint.as_deref() {
            if let Some(cp) = Checkpoint::load(path)? {
                if cp.matches(&digest, self.cfg.batch_size) {
                    self.progress.info(format!(
                        "Resume from {}: {}/{} batches done, {} translations",
                        path.display(),
                        cp.next_batch.min(total),
                        total,
                        cp.translations.len()
                    ));
                    aggregator = Aggregator::seeded(self.cfg.merge_policy, cp.translations.clone());
                    checkpoint = cp;
                } else {
                    self.progress.warn(format!(
                        "checkpoint {} belongs to a different input or batch size; starting over",
                        path.display()
                    ));
                }
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        for batch in &batches {
            if batch.index < checkpoint.next_batch {
                outcomes.push(BatchOutcome {
                    index: batch.index,
                    size: batch.len(),
                    map: TranslationMap::new(),
                    status: BatchStatus::Resumed,
                });
                continue;
            }
            self.progress.progress("Translate", batch.index + 1, total);

            let outcome = self.translate_batch(batch);
            let conflicts = aggregator.merge(&outcome.map);
            for c in &conflicts {
                self.progress.warn(format!(
                    "batch {}: `{}` translated twice; kept \"{}\", dropped \"{}\"",
                    batch.index, c.key, c.kept, c.dropped
                ));
            }
            outcomes.push(outcome);

            if let Err(e) = on_batch(aggregator.map()) {
                self.progress.warn(format!("autosave failed: {e:#}"));
            }
            if let Some(path) = self.cfg.checkpoint.as_deref() {
                checkpoint.next_batch = batch.index + 1;
                checkpoint.translations = aggregator.map().clone();
                checkpoint.save(path)?;
            }
        }

        let elapsed = self.client.clock().now().saturating_sub(t0);
        let report = RunReport {
            outcomes,
            translations: aggregator.into_map(),
            elapsed_secs: elapsed.as_secs_f64(),
        };
        self.progress.info(report.summary_line());
        Ok(report)
    }

    fn translate_batch(&mut self, batch: &Batch) -> BatchOutcome {
        let prompt = build_batch_prompt(batch, &self.cfg.policy, &self.cfg.prompts);
        self.trace_text(batch.index, "prompt", &prompt);

        let parsed = self.client.translate(&prompt).and_then(|reply| {
            self.trace_text(batch.index, "reply", &reply);
            parse_reply(self.cfg.policy.output_format, &reply, batch)
        });

        match parsed {
            Ok(parsed) => {
                if parsed.discarded > 0 {
                    self.progress.warn(format!(
                        "batch {}: discarded {} unusable reply item(s)",
                        batch.index, parsed.discarded
                    ));
                }
                let missing = batch.missing_from(&parsed.map);
                let status = if missing.is_empty() {
                    BatchStatus::Complete
                } else {
                    BatchStatus::Partial { missing }
                };
                BatchOutcome {
                    index: batch.index,
                    size: batch.len(),
                    map: parsed.map,
                    status,
                }
            }
            Err(failure) => {
                self.progress
                    .warn(format!("batch {} failed: {failure}", batch.index));
                self.trace_text(batch.index, "error", &failure.to_string());
                BatchOutcome {
                    index: batch.index,
                    size: batch.len(),
                    map: TranslationMap::new(),
                    status: BatchStatus::Failed(failure),
                }
            }
        }
    }

    fn trace_text(&self, batch_index: usize, kind: &str, text: &str) {
        if let Err(e) = self.trace.write_batch_text(batch_index, kind, text) {
            self.progress.warn(format!("trace: {e:#}"));
        }
    }
}
