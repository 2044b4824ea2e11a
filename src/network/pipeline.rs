//! Amplifier chains: linear pipelines, feedback loops and phase search.
//!
//! Every amplifier runs the same program. Each one first reads its phase setting,
//! then processes signals from its input channel. The first amplifier also
//! receives the initial signal right after its phase.

use crate::info;
use crate::network::topology::{Topology, TopologyError};
use crate::virtual_machine::program::Program;

/// Phase settings of a five-stage linear pipeline.
pub const PIPELINE_PHASES: [i64; 5] = [0, 1, 2, 3, 4];
/// Phase settings of a five-stage feedback loop.
pub const FEEDBACK_PHASES: [i64; 5] = [5, 6, 7, 8, 9];

/// Loads every phase onto its amplifier's input, then the signal onto the first one.
fn prime(topology: &Topology, phases: &[i64], signal: i64) {
    for (link, phase) in topology.links().iter().zip(phases) {
        link.input.put(*phase);
    }
    if let Some(first) = topology.link(0) {
        first.input.put(signal);
    }
}

fn check_phases(phases: &[i64]) -> Result<(), TopologyError> {
    if phases.is_empty() {
        return Err(TopologyError::InvalidConfig(
            "at least one phase setting is required".to_string(),
        ));
    }
    Ok(())
}

/// Runs `program` on one amplifier per phase, chained output to input.
///
/// Returns the last value written by the last amplifier.
pub async fn run_pipeline(
    program: &Program,
    phases: &[i64],
    signal: i64,
) -> Result<i64, TopologyError> {
    check_phases(phases)?;
    let topology = Topology::pipeline(phases.len());
    prime(&topology, phases, signal);

    topology.run_to_halt(program).await?;

    topology
        .link(phases.len() - 1)
        .and_then(|link| link.output.drain().last().copied())
        .ok_or(TopologyError::MissingOutput)
}

/// Runs `program` on one amplifier per phase, with the last amplifier feeding the first.
///
/// Amplifiers run concurrently until all of them halt. Returns the last value left
/// on the channel that closes the loop.
pub async fn run_feedback_loop(
    program: &Program,
    phases: &[i64],
    signal: i64,
) -> Result<i64, TopologyError> {
    check_phases(phases)?;
    let topology = Topology::feedback_loop(phases.len());
    prime(&topology, phases, signal);

    topology.run_to_halt(program).await?;

    topology
        .link(0)
        .and_then(|link| link.input.drain().last().copied())
        .ok_or(TopologyError::MissingOutput)
}

/// Tries every ordering of `phases` and returns the highest final signal together
/// with the ordering that produced it.
///
/// Ties keep the first ordering found.
pub async fn max_signal(
    program: &Program,
    phases: &[i64],
    feedback: bool,
) -> Result<(i64, Vec<i64>), TopologyError> {
    check_phases(phases)?;

    let mut best: Option<(i64, Vec<i64>)> = None;
    for ordering in permutations(phases) {
        let signal = if feedback {
            run_feedback_loop(program, &ordering, 0).await?
        } else {
            run_pipeline(program, &ordering, 0).await?
        };

        if best.as_ref().is_none_or(|(max, _)| signal > *max) {
            best = Some((signal, ordering));
        }
    }

    let (signal, ordering) = best.ok_or(TopologyError::MissingOutput)?;
    info!("best signal {} with phases {:?}", signal, ordering);
    Ok((signal, ordering))
}

/// Returns every ordering of `items` (Heap's algorithm).
pub fn permutations(items: &[i64]) -> Vec<Vec<i64>> {
    let mut items = items.to_vec();
    let n = items.len();
    let mut result = vec![items.clone()];
    let mut counters = vec![0usize; n];

    let mut i = 1;
    while i < n {
        if counters[i] < i {
            if i % 2 == 0 {
                items.swap(0, i);
            } else {
                items.swap(counters[i], i);
            }
            result.push(items.clone());
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }

    result
}
