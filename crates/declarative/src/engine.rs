//! Convergence engine - walks the plan and applies only what diverges
//!
//! For each resource in plan order the engine probes current state, skips
//! resources that already match, applies the rest, and fires `notify`
//! edges from every resource that changed. A failure blocks the failed
//! resource's transitive dependents; independent branches keep going.

use crate::context::{ApplyContext, ProgressCallback};
use crate::error::Error;
use crate::graph::ResourceGraph;
use crate::report::{ReportEntry, RunReport};
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, Outcome, ResourceKey, ResourceState};
use anyhow::Result;
use chrono::Utc;
use rayon::prelude::*;

/// Converge every resource in the graph
///
/// With `opts.jobs <= 1` resources run strictly in plan order. With more
/// jobs, each wave of mutually independent resources runs on a thread pool
/// and results are merged before the next wave starts.
pub fn converge<P: ProgressCallback>(
    graph: &ResourceGraph,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let mut run = Run::new(graph);

    progress.on_run_start(graph.len());

    if opts.jobs <= 1 || graph.len() <= 1 {
        for &i in graph.order() {
            let outcome = match run.blocker(i) {
                Some(by) => Outcome::Blocked { by },
                None => {
                    let notified_by = run.notified_keys(i);
                    evaluate(run.resource(i), &notified_by, opts, progress)
                }
            };
            run.record(i, outcome, progress);
        }
    } else {
        converge_waves(graph, &mut run, opts, progress)?;
    }

    progress.on_run_complete();

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        entries: run.into_entries(),
    })
}

/// Simple convergence without progress reporting
pub fn converge_simple(graph: &ResourceGraph, opts: &ExecuteOptions) -> Result<RunReport> {
    converge(graph, opts, &mut crate::context::NoProgress)
}

fn converge_waves<P: ProgressCallback>(
    graph: &ResourceGraph,
    run: &mut Run<'_>,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    for wave in graph.wave_indices() {
        let mut blocked = Vec::new();
        let mut ready = Vec::new();
        for i in wave {
            match run.blocker(i) {
                Some(by) => blocked.push((i, Outcome::Blocked { by })),
                None => ready.push((i, run.notified_keys(i))),
            }
        }

        let shared: &Run<'_> = run;
        let evaluated: Vec<(usize, Outcome, Recorder)> = pool.install(|| {
            ready
                .par_iter()
                .map(|(i, notified_by)| {
                    let mut recorder = Recorder::default();
                    let outcome = evaluate(shared.resource(*i), notified_by, opts, &mut recorder);
                    (*i, outcome, recorder)
                })
                .collect()
        });

        let mut finished: Vec<(usize, Outcome, Option<Recorder>)> = blocked
            .into_iter()
            .map(|(i, o)| (i, o, None))
            .chain(evaluated.into_iter().map(|(i, o, r)| (i, o, Some(r))))
            .collect();
        finished.sort_by_key(|(i, _, _)| run.position[*i]);

        for (i, outcome, recorder) in finished {
            if let Some(recorder) = recorder {
                recorder.replay(progress);
            }
            run.record(i, outcome, progress);
        }
    }

    Ok(())
}

/// Probe, then apply or refresh a single unblocked resource
fn evaluate(
    resource: &dyn Resource,
    notified_by: &[ResourceKey],
    opts: &ExecuteOptions,
    progress: &mut dyn ProgressCallback,
) -> Outcome {
    let key = resource.key();
    let desired = resource.desired_state();

    let current = match resource.current_state() {
        Ok(state) => state,
        Err(e) => {
            let err = Error::Probe {
                key: key.clone(),
                message: format!("{e:#}"),
            };
            log::warn!("{err}; assuming it needs apply");
            ResourceState::Unknown
        }
    };
    log::debug!("{key}: pending -> probed ({current})");
    progress.on_probed(&key, &current);

    let mut ctx = ApplyContext::new(opts.verbose, opts.exec_timeout);

    if current.satisfies(&desired) {
        if notified_by.is_empty() {
            return Outcome::Unchanged;
        }
        ctx.notified_by = notified_by.to_vec();
        log::debug!("{key}: refreshing (notified by {})", join_keys(notified_by));
        progress.on_apply_start(&key, &format!("Refresh {key}"));
        return outcome_of(&key, resource.refresh(&ctx));
    }

    log::debug!("{key}: probed -> applying ({current} -> {desired})");
    progress.on_apply_start(&key, &resource.description());
    outcome_of(&key, resource.apply(&ctx))
}

fn outcome_of(key: &ResourceKey, result: Result<ApplyResult>) -> Outcome {
    let outcome = match result {
        Ok(ApplyResult::Failed { error }) => Outcome::Failed { error },
        Ok(result) => match result.change() {
            Some(change) => Outcome::Applied { change },
            None => Outcome::Unchanged,
        },
        Err(e) => Outcome::Failed {
            error: format!("{e:#}"),
        },
    };

    if let Outcome::Failed { error } = &outcome {
        log::error!(
            "{}",
            Error::Apply {
                key: key.clone(),
                message: error.clone(),
            }
        );
    }
    outcome
}

fn join_keys(keys: &[ResourceKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Mutable bookkeeping of one run, indexed like the graph's nodes
struct Run<'g> {
    graph: &'g ResourceGraph,
    outcomes: Vec<Option<Outcome>>,
    notified_by: Vec<Vec<usize>>,
    position: Vec<usize>,
}

impl<'g> Run<'g> {
    fn new(graph: &'g ResourceGraph) -> Self {
        let n = graph.len();
        let mut position = vec![0; n];
        for (pos, &i) in graph.order().iter().enumerate() {
            position[i] = pos;
        }
        Self {
            graph,
            outcomes: vec![None; n],
            notified_by: vec![Vec::new(); n],
            position,
        }
    }

    fn resource(&self, i: usize) -> &'g dyn Resource {
        self.graph.nodes()[i].decl.resource.as_ref()
    }

    fn key(&self, i: usize) -> ResourceKey {
        self.resource(i).key()
    }

    /// The failed ancestor that blocks `i`, if any
    fn blocker(&self, i: usize) -> Option<ResourceKey> {
        self.graph.nodes()[i]
            .dependencies
            .iter()
            .find_map(|&dep| match self.outcomes[dep].as_ref()? {
                Outcome::Failed { .. } => Some(self.key(dep)),
                Outcome::Blocked { by } => Some(by.clone()),
                Outcome::Unchanged | Outcome::Applied { .. } => None,
            })
    }

    fn notified_keys(&self, i: usize) -> Vec<ResourceKey> {
        self.notified_by[i].iter().map(|&n| self.key(n)).collect()
    }

    fn record(&mut self, i: usize, outcome: Outcome, progress: &mut dyn ProgressCallback) {
        let key = self.key(i);
        log::debug!("{key}: {}", outcome.label());

        if outcome.is_change() {
            for &target in &self.graph.nodes()[i].notifies {
                log::debug!("{key} notifies {}", self.key(target));
                self.notified_by[target].push(i);
            }
        }

        progress.on_resource_complete(&key, &outcome);
        self.outcomes[i] = Some(outcome);
    }

    fn into_entries(self) -> Vec<ReportEntry> {
        let Run {
            graph,
            mut outcomes,
            notified_by,
            ..
        } = self;

        graph
            .order()
            .iter()
            .map(|&i| {
                let resource = graph.nodes()[i].decl.resource.as_ref();
                ReportEntry {
                    key: resource.key(),
                    description: resource.description(),
                    outcome: outcomes[i].take().unwrap_or(Outcome::Unchanged),
                    notified_by: notified_by[i]
                        .iter()
                        .map(|&n| graph.nodes()[n].decl.key())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Progress events captured on a worker thread, replayed in plan order
#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
}

enum Event {
    Probed(ResourceKey, ResourceState),
    ApplyStart(ResourceKey, String),
}

impl Recorder {
    fn replay(self, progress: &mut dyn ProgressCallback) {
        for event in self.events {
            match event {
                Event::Probed(key, state) => progress.on_probed(&key, &state),
                Event::ApplyStart(key, desc) => progress.on_apply_start(&key, &desc),
            }
        }
    }
}

impl ProgressCallback for Recorder {
    fn on_run_start(&mut self, _total: usize) {}

    fn on_probed(&mut self, key: &ResourceKey, current: &ResourceState) {
        self.events.push(Event::Probed(key.clone(), current.clone()));
    }

    fn on_apply_start(&mut self, key: &ResourceKey, description: &str) {
        self.events
            .push(Event::ApplyStart(key.clone(), description.to_string()));
    }

    // Completion is reported by the engine itself once the wave is merged.
    fn on_resource_complete(&mut self, _key: &ResourceKey, _outcome: &Outcome) {}

    fn on_run_complete(&mut self) {}
}
