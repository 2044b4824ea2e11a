//! Channel wiring shared by every multi-machine scenario.
//!
//! A [`Topology`] maps each machine index to the input and output channel it is
//! bound to. It is built once per scenario and never changes while machines run.

use crate::network::channel::Channel;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::Machine;
use crate::{debug, warn};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Errors that abort a multi-machine scenario.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// A machine failed with a fatal execution error.
    #[error("machine {index} failed: {source}")]
    Machine {
        index: usize,
        #[source]
        source: VMError,
    },

    /// A machine task panicked or was cancelled.
    #[error("machine task failed: {0}")]
    TaskFailed(String),

    /// Every machine halted before the network reached a fixed point.
    #[error("network stalled after {rounds} rounds: every machine halted")]
    Stalled { rounds: u64 },

    /// The network did not reach a fixed point within the round limit.
    #[error("network did not settle within {rounds} rounds")]
    RoundLimit { rounds: u64 },

    /// The scenario parameters cannot describe a runnable topology.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The final channel held no value once every machine halted.
    #[error("no output value left on the final channel")]
    MissingOutput,
}

/// Channels a single machine is bound to.
#[derive(Clone, Debug)]
pub struct Link {
    pub input: Arc<Channel>,
    pub output: Arc<Channel>,
}

/// Immutable machine index to channel map.
#[derive(Clone, Debug)]
pub struct Topology {
    links: Vec<Link>,
}

impl Topology {
    /// `n` machines in a chain: machine `k` writes to machine `k + 1`.
    ///
    /// The chain has `n + 1` channels. The first is the input of machine 0 and the
    /// last is the output of machine `n - 1`.
    pub fn pipeline(n: usize) -> Self {
        let channels: Vec<Arc<Channel>> = (0..=n).map(|_| Channel::new()).collect();
        let links = (0..n)
            .map(|k| Link {
                input: channels[k].clone(),
                output: channels[k + 1].clone(),
            })
            .collect();
        Self { links }
    }

    /// `n` machines in a ring: machine `k` writes to machine `(k + 1) % n`.
    pub fn feedback_loop(n: usize) -> Self {
        let channels: Vec<Arc<Channel>> = (0..n).map(|_| Channel::new()).collect();
        let links = (0..n)
            .map(|k| Link {
                input: channels[k].clone(),
                output: channels[(k + 1) % n].clone(),
            })
            .collect();
        Self { links }
    }

    /// `n` machines with private channels, connected only through a router.
    pub fn isolated(n: usize) -> Self {
        let links = (0..n)
            .map(|_| Link {
                input: Channel::new(),
                output: Channel::new(),
            })
            .collect();
        Self { links }
    }

    /// Returns the number of machines.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the topology has no machines.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Returns the channels of machine `index`.
    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    /// Returns every link, in machine order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Creates one machine per link, each over its own copy of `program`.
    pub fn machines(&self, program: &Program) -> Vec<Machine> {
        self.links
            .iter()
            .map(|link| Machine::with_channels(program, link.input.clone(), link.output.clone()))
            .collect()
    }

    /// Runs one machine per link in blocking mode, each on its own task, until all halt.
    ///
    /// The first failure aborts every other task. All tasks are joined before this
    /// returns, whatever the outcome.
    pub async fn run_to_halt(&self, program: &Program) -> Result<(), TopologyError> {
        let mut tasks = JoinSet::new();
        for (index, mut machine) in self.machines(program).into_iter().enumerate() {
            tasks.spawn(async move {
                let result = machine.run().await;
                debug!("machine {} finished after {} steps", index, machine.steps());
                (index, result)
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok((_, Ok(_))) => continue,
                Ok((index, Err(source))) => TopologyError::Machine { index, source },
                Err(err) if err.is_cancelled() => continue,
                Err(err) => TopologyError::TaskFailed(err.to_string()),
            };

            if failure.is_none() {
                warn!("aborting {} machines: {}", tasks.len(), error);
                tasks.abort_all();
                failure = Some(error);
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
