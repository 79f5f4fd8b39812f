use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::anyhow;
use regex::Regex;
use serde_json::{json, Value};

use label_translator::ir::{Entry, TranslationMap};
use label_translator::models::{ChatBackend, ChatRequest};
use label_translator::pipeline::rehydrate::{fallback_column, fill_column, rebuild_tree};
use label_translator::pipeline::{
    BatchStatus, OutputFormat, PipelineConfig, TranslationClient, TranslatorPipeline,
};
use label_translator::progress::ConsoleProgress;
use label_translator::table::Table;
use label_translator::throttle::{Clock, Throttle};
use label_translator::tree::TextTree;

#[derive(Clone, Default)]
struct TestClock {
    now: Rc<Cell<Duration>>,
}

impl TestClock {
    fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

enum Step {
    /// Answer every item of the prompt, except those whose text is listed.
    Translate { abstain: Vec<&'static str> },
    Fail,
    Raw(&'static str),
}

/// Reads the numbered items back out of the prompt and answers in the requested format.
struct EchoTranslator {
    clock: TestClock,
    call_cost: VecDeque<Duration>,
    steps: VecDeque<Step>,
    starts: Rc<RefCell<Vec<Duration>>>,
}

impl EchoTranslator {
    fn new(clock: TestClock) -> Self {
        Self {
            clock,
            call_cost: VecDeque::new(),
            steps: VecDeque::new(),
            starts: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

fn tr(text: &str) -> String {
    format!("TR[{text}]")
}

impl ChatBackend for EchoTranslator {
    fn name(&self) -> &str {
        "echo"
    }

    fn complete(&mut self, request: &ChatRequest) -> anyhow::Result<String> {
        self.starts.borrow_mut().push(self.clock.now());
        if let Some(cost) = self.call_cost.pop_front() {
            self.clock.advance(cost);
        }
        let step = self
            .steps
            .pop_front()
            .unwrap_or(Step::Translate { abstain: Vec::new() });
        let abstain = match step {
            Step::Fail => return Err(anyhow!("503 service unavailable")),
            Step::Raw(text) => return Ok(text.to_string()),
            Step::Translate { abstain } => abstain,
        };

        let item_re = Regex::new(r"^\d+\. (.+)$").expect("item regex");
        let prompt = request.user_prompt();
        let json_mode = prompt.contains("JSON object");
        let mut lines = Vec::new();
        let mut obj = serde_json::Map::new();
        for line in prompt.lines() {
            let Some(c) = item_re.captures(line) else {
                continue;
            };
            let item = &c[1];
            if json_mode {
                let pair: Value = serde_json::from_str(&format!("{{{item}}}")).expect("item pair");
                for (k, v) in pair.as_object().expect("object") {
                    let text = v.as_str().expect("text");
                    let value = if abstain.iter().any(|a| *a == text) {
                        String::new()
                    } else {
                        tr(text)
                    };
                    obj.insert(k.clone(), Value::String(value));
                }
            } else if abstain.iter().any(|a| *a == item) {
                lines.push(format!("{item}:"));
            } else {
                lines.push(format!("{item}: {}", tr(item)));
            }
        }
        if json_mode {
            Ok(format!("```json\n{}\n```", Value::Object(obj)))
        } else {
            Ok(format!("Here you go:\n{}", lines.join("\n")))
        }
    }
}

fn pipeline(
    cfg: PipelineConfig,
    backend: EchoTranslator,
) -> TranslatorPipeline<EchoTranslator, TestClock> {
    let throttle = Throttle::with_clock(cfg.min_interval, backend.clock.clone());
    let client = TranslationClient::with_throttle(backend, &cfg.service, throttle);
    TranslatorPipeline::new(cfg, ConsoleProgress::new(false), client)
}

fn config(batch_size: usize, format: OutputFormat) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        batch_size,
        min_interval: Duration::from_secs(2),
        ..Default::default()
    };
    cfg.policy.output_format = format;
    cfg
}

#[test]
fn table_column_is_fully_covered_after_fallback() {
    let table = Table::parse(
        "Job Titles_En\nCook\nChef\nNurse\nCook\nPilot\nWelder\nBaker\n",
    )
    .expect("csv");
    let entries = table.column_entries("Job Titles_En").expect("column");
    assert_eq!(entries.len(), 7);

    let mut backend = EchoTranslator::new(TestClock::default());
    backend.steps = VecDeque::from(vec![
        Step::Translate {
            abstain: vec!["Chef"],
        },
        Step::Fail,
        Step::Translate { abstain: vec![] },
    ]);
    let mut p = pipeline(config(3, OutputFormat::Line), backend);
    let report = p.run(&entries, |_| Ok(())).expect("run");

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.outcomes[0].status,
        BatchStatus::Partial {
            missing: vec!["Chef".to_string()]
        }
    );

    let keys = table.column("Job Titles_En").expect("column");
    let filled = fill_column(&keys, &report.translations);
    let column = fallback_column(filled, &keys);
    assert_eq!(
        column,
        vec![
            tr("Cook"),
            "Chef".to_string(),
            tr("Nurse"),
            tr("Cook"),
            "Pilot".to_string(),
            "Welder".to_string(),
            tr("Baker"),
        ]
    );
    assert!(column.iter().all(|v| !v.trim().is_empty()));
}

#[test]
fn nested_document_round_trips_in_json_mode() {
    let doc = json!({
        "homePage": {
            "welcome": "Akademiye hoş geldiniz!",
            "cards": { "courses": "Kurslar", "exams": "Sınavlar" }
        },
        "sidebar": { "homePage": "Ana sayfa" }
    });
    let tree = TextTree::from_json(&doc).expect("tree");
    let entries = tree.flatten();

    let mut backend = EchoTranslator::new(TestClock::default());
    backend.steps = VecDeque::from(vec![
        Step::Translate { abstain: vec![] },
        Step::Raw("{\"homePage.cards.exams\": \"Exams\""),
    ]);
    let mut p = pipeline(config(2, OutputFormat::Json), backend);
    let report = p.run(&entries, |_| Ok(())).expect("run");
    assert_eq!(report.complete(), 1);
    assert_eq!(report.failed(), 1);

    let partial = rebuild_tree(&entries, &report.translations, false).expect("partial");
    assert_eq!(
        partial.to_json(),
        json!({"homePage": {"welcome": tr("Akademiye hoş geldiniz!"), "cards": {"courses": tr("Kurslar")}}})
    );

    let full = rebuild_tree(&entries, &report.translations, true).expect("full");
    assert_eq!(
        full.to_json(),
        json!({
            "homePage": {
                "welcome": tr("Akademiye hoş geldiniz!"),
                "cards": { "courses": tr("Kurslar"), "exams": "Sınavlar" }
            },
            "sidebar": { "homePage": "Ana sayfa" }
        })
    );
}

#[test]
fn call_starts_respect_the_interval() {
    let clock = TestClock::default();
    let mut backend = EchoTranslator::new(clock.clone());
    backend.call_cost = VecDeque::from(vec![
        Duration::from_millis(300),
        Duration::from_secs(5),
        Duration::from_millis(1999),
        Duration::ZERO,
    ]);
    backend.steps = VecDeque::from(vec![
        Step::Translate { abstain: vec![] },
        Step::Fail,
        Step::Translate { abstain: vec![] },
        Step::Translate { abstain: vec![] },
        Step::Translate { abstain: vec![] },
    ]);
    let starts = Rc::clone(&backend.starts);
    let entries: Vec<Entry> = (0..5).map(|i| Entry::keyed_by_text(format!("Job {i}"))).collect();

    let mut p = pipeline(config(1, OutputFormat::Line), backend);
    let report = p.run(&entries, |_| Ok(())).expect("run");
    assert_eq!(report.outcomes.len(), 5);

    let starts = starts.borrow();
    assert_eq!(starts.len(), 5);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(2), "{pair:?}");
    }
    assert_eq!(starts[2] - starts[1], Duration::from_secs(5));
}

#[test]
fn every_entry_is_sent_exactly_once() {
    let entries: Vec<Entry> = (0..23).map(|i| Entry::keyed_by_text(format!("Skill {i}"))).collect();
    let backend = EchoTranslator::new(TestClock::default());
    let mut p = pipeline(config(5, OutputFormat::Line), backend);

    let mut sizes = Vec::new();
    let report = p
        .run(&entries, |map: &TranslationMap| {
            sizes.push(map.len());
            Ok(())
        })
        .expect("run");
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(sizes, vec![5, 10, 15, 20, 23]);
    assert_eq!(
        report.outcomes.iter().map(|o| o.size).sum::<usize>(),
        entries.len()
    );
    assert_eq!(report.translations.len(), 23);
    assert_eq!(report.complete(), 5);
}
