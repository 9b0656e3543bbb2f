#![allow(dead_code)]

use std::time::Duration;

use ecsroll_core::prelude::*;

/// Answers prompts from a script, then "yes" once the script runs out.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Vec<bool>,
    pub seen: Vec<String>,
}

impl ScriptedPrompter {
    pub fn yes() -> Self {
        Self::default()
    }

    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.to_vec(),
            seen: Vec::new(),
        }
    }

    /// Say yes to everything except the first prompt containing `needle`.
    pub fn declining(needle: &str) -> DecliningPrompter {
        DecliningPrompter {
            needle: needle.to_string(),
            seen: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, message: &str) -> anyhow::Result<bool> {
        let answer = self.answers.get(self.seen.len()).copied().unwrap_or(true);
        self.seen.push(message.to_string());
        Ok(answer)
    }
}

pub struct DecliningPrompter {
    needle: String,
    pub seen: Vec<String>,
}

impl Prompter for DecliningPrompter {
    fn confirm(&mut self, message: &str) -> anyhow::Result<bool> {
        self.seen.push(message.to_string());
        Ok(!message.contains(&self.needle))
    }
}

type Fault<'s> = Box<dyn FnOnce(&SimulatedCloud) + 's>;

/// Advances the simulation once per pause instead of sleeping.
pub struct TickingPacer<'s> {
    sim: &'s SimulatedCloud,
    trigger: Option<(String, Fault<'s>)>,
    pub pauses: Vec<(String, Duration)>,
}

impl<'s> TickingPacer<'s> {
    pub fn new(sim: &'s SimulatedCloud) -> Self {
        Self {
            sim,
            trigger: None,
            pauses: Vec::new(),
        }
    }

    /// Run `fault` once, before the tick of the first pause whose message contains `needle`.
    pub fn with_fault(
        mut self,
        needle: &str,
        fault: impl FnOnce(&SimulatedCloud) + 's,
    ) -> Self {
        self.trigger = Some((needle.to_string(), Box::new(fault)));
        self
    }
}

impl Pacer for TickingPacer<'_> {
    fn pause(&mut self, message: &str, duration: Duration) {
        self.pauses.push((message.to_string(), duration));
        if self
            .trigger
            .as_ref()
            .is_some_and(|(needle, _)| message.contains(needle.as_str()))
        {
            if let Some((_, fault)) = self.trigger.take() {
                fault(self.sim);
            }
        }
        self.sim.tick();
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Vec<(String, Vec<String>)>,
}

impl RecordingReporter {
    pub fn headings(&self) -> Vec<&str> {
        self.reports.iter().map(|(h, _)| h.as_str()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn snapshot(&mut self, heading: &str, snapshot: &ClusterSnapshot) {
        self.reports
            .push((heading.to_string(), snapshot.compute_ids()));
    }
}

/// Run `config` against `sim` with the given prompter, returning the outcome and what was reported.
pub fn run_with(
    sim: &SimulatedCloud,
    config: &RollConfig,
    prompter: &mut dyn Prompter,
) -> (Result<RollReport, RollError>, RecordingReporter, usize) {
    run_paced(sim, config, prompter, TickingPacer::new(sim))
}

/// Like [`run_with`], with a pacer that may inject a fault mid-run.
pub fn run_paced(
    sim: &SimulatedCloud,
    config: &RollConfig,
    prompter: &mut dyn Prompter,
    mut pacer: TickingPacer<'_>,
) -> (Result<RollReport, RollError>, RecordingReporter, usize) {
    let mut reporter = RecordingReporter::default();
    let result = RollingOrchestrator::new(
        sim,
        config,
        OperatorIo {
            prompter,
            pacer: &mut pacer,
            reporter: &mut reporter,
        },
    )
    .run();
    let pauses = pacer.pauses.len();
    (result, reporter, pauses)
}

pub fn config(action: Action) -> RollConfig {
    RollConfig::new("prod", action).with_wait(Duration::from_secs(1))
}
