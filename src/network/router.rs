//! Packet network of machines supervised by a NAT.
//!
//! Every node runs the same program on its own task and receives its address as
//! its first input. The router drives the network in rounds:
//!
//! 1. every node whose input queue is empty receives [`NO_PACKET`];
//! 2. every live node runs in suspending mode until it needs more input;
//! 3. the packets each node produced are routed by destination address.
//!
//! Packets addressed to the NAT are captured instead of delivered. Once a round
//! passes in which no node emitted any value, not even part of a packet, the
//! network is idle, and the NAT sends its latest
//! packet to address 0. The run ends when the NAT sends the same `y` value twice
//! in a row.

use crate::network::channel::Channel;
use crate::network::packet::Packet;
use crate::network::topology::{Topology, TopologyError};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::{Completion, Machine};
use crate::{debug, info, warn};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Default number of nodes.
pub const DEFAULT_NETWORK_SIZE: usize = 50;
/// Default address captured by the NAT.
pub const NAT_ADDRESS: i64 = 255;
/// Input value meaning "no packet this round".
pub const NO_PACKET: i64 = -1;

/// Configuration of a network run.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Number of nodes, addressed `0..size`.
    pub size: usize,
    /// Address captured by the NAT. Must not collide with a node address.
    pub nat_address: i64,
    /// Consecutive packet-free rounds after which the network counts as idle.
    pub idle_rounds: u32,
    /// Fails the run with [`TopologyError::RoundLimit`] past this many rounds.
    pub max_rounds: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_NETWORK_SIZE,
            nat_address: NAT_ADDRESS,
            idle_rounds: 1,
            max_rounds: None,
        }
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<(), TopologyError> {
        if self.size == 0 {
            return Err(TopologyError::InvalidConfig(
                "network needs at least one node".to_string(),
            ));
        }
        if (0..self.size as i64).contains(&self.nat_address) {
            return Err(TopologyError::InvalidConfig(format!(
                "NAT address {} collides with a node address",
                self.nat_address
            )));
        }
        if self.idle_rounds == 0 {
            return Err(TopologyError::InvalidConfig(
                "idle detection needs at least one round".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a network run that reached its fixed point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkReport {
    /// First packet ever addressed to the NAT.
    pub first_nat_packet: Packet,
    /// Packet the NAT sent to address 0 twice in a row.
    pub repeated_packet: Packet,
    /// Number of rounds executed.
    pub rounds: u64,
    /// Packets delivered to nodes, NAT injections included.
    pub delivered: u64,
    /// Packets addressed to nothing.
    pub dropped: u64,
}

/// Per-round result of a single node.
struct NodeReport {
    address: usize,
    outcome: Result<NodeRound, VMError>,
}

/// What a node did during one round.
struct NodeRound {
    completion: Completion,
    /// Complete packets drained from the output channel.
    packets: Vec<Packet>,
    /// The output channel held values after the run, partial packets included.
    active: bool,
}

/// Packet-capturing supervisor of the network.
#[derive(Debug, Default)]
struct Nat {
    first: Option<Packet>,
    latest: Option<Packet>,
    last_sent: Option<Packet>,
}

impl Nat {
    fn capture(&mut self, packet: Packet) {
        if self.first.is_none() {
            info!("NAT received its first packet: {}", packet);
        }
        self.first.get_or_insert(packet);
        self.latest = Some(packet);
    }
}

/// Runs one node: waits for each round, runs until input is needed and reports
/// the packets produced. Returns when the router closes the round channel, or
/// after reporting a halt or a failure.
async fn run_node(
    address: usize,
    mut machine: Machine,
    mut rounds: watch::Receiver<u64>,
    reports: mpsc::Sender<NodeReport>,
) {
    while rounds.changed().await.is_ok() {
        let round = *rounds.borrow_and_update();

        let outcome = machine.run_until_input().map(|completion| NodeRound {
            completion,
            active: !machine.output().is_empty(),
            packets: Packet::drain_from(machine.output()),
        });
        let done = !matches!(
            outcome,
            Ok(NodeRound {
                completion: Completion::AwaitingInput,
                ..
            })
        );

        if let Ok(node_round) = &outcome {
            debug!(
                "node {} round {}: {:?} with {} packets",
                address,
                round,
                node_round.completion,
                node_round.packets.len()
            );
        }

        if reports.send(NodeReport { address, outcome }).await.is_err() || done {
            break;
        }
    }
}

/// Routing table from node address to input channel.
fn routing_table(topology: &Topology) -> DashMap<i64, Arc<Channel>> {
    let routes = DashMap::with_capacity(topology.len());
    for (address, link) in topology.links().iter().enumerate() {
        routes.insert(address as i64, link.input.clone());
    }
    routes
}

/// Closes the round channel and joins every node task.
async fn shutdown(
    round_tx: watch::Sender<u64>,
    report_rx: mpsc::Receiver<NodeReport>,
    mut tasks: JoinSet<()>,
) -> Result<(), TopologyError> {
    drop(round_tx);
    drop(report_rx);

    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            failure.get_or_insert(TopologyError::TaskFailed(err.to_string()));
        }
    }

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Runs `program` on a network of `config.size` nodes until the NAT sends the same
/// `y` value to address 0 twice in a row.
pub async fn run_network(
    program: &Program,
    config: &NetworkConfig,
) -> Result<NetworkReport, TopologyError> {
    config.validate()?;

    let topology = Topology::isolated(config.size);
    let routes = routing_table(&topology);

    let (round_tx, _) = watch::channel(0u64);
    let (report_tx, mut report_rx) = mpsc::channel(config.size);
    let mut tasks = JoinSet::new();

    for (address, machine) in topology.machines(program).into_iter().enumerate() {
        machine.push_input(address as i64);
        tasks.spawn(run_node(
            address,
            machine,
            round_tx.subscribe(),
            report_tx.clone(),
        ));
    }
    drop(report_tx);

    info!(
        "network of {} nodes started, NAT at address {}",
        config.size, config.nat_address
    );

    let result = route_rounds(config, &routes, &round_tx, &mut report_rx, &mut tasks).await;

    shutdown(round_tx, report_rx, tasks).await?;
    result
}

/// Waits for one report from each of the `live` nodes.
///
/// Node tasks are joined alongside, so a task that dies without reporting fails
/// the round instead of leaving the router waiting.
async fn collect_reports(
    live: usize,
    report_rx: &mut mpsc::Receiver<NodeReport>,
    tasks: &mut JoinSet<()>,
) -> Result<Vec<NodeReport>, TopologyError> {
    let mut reports = Vec::with_capacity(live);
    while reports.len() < live {
        tokio::select! {
            biased;
            report = report_rx.recv() => match report {
                Some(report) => reports.push(report),
                None => {
                    return Err(TopologyError::TaskFailed(
                        "node task exited without reporting".to_string(),
                    ));
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = joined {
                    return Err(TopologyError::TaskFailed(err.to_string()));
                }
            }
        }
    }
    Ok(reports)
}

/// Router main loop. Returns once the NAT repeats itself or the run fails.
async fn route_rounds(
    config: &NetworkConfig,
    routes: &DashMap<i64, Arc<Channel>>,
    round_tx: &watch::Sender<u64>,
    report_rx: &mut mpsc::Receiver<NodeReport>,
    tasks: &mut JoinSet<()>,
) -> Result<NetworkReport, TopologyError> {
    let mut nat = Nat::default();
    let mut live = config.size;
    let mut idle = 0u32;
    let mut delivered = 0u64;
    let mut dropped = 0u64;
    let mut round = 0u64;

    loop {
        if live == 0 {
            return Err(TopologyError::Stalled { rounds: round });
        }
        if config.max_rounds.is_some_and(|max_rounds| round >= max_rounds) {
            return Err(TopologyError::RoundLimit { rounds: round });
        }
        round += 1;

        for route in routes.iter() {
            if route.value().is_empty() {
                route.value().put(NO_PACKET);
            }
        }

        round_tx
            .send(round)
            .map_err(|_| TopologyError::TaskFailed("every node task is gone".to_string()))?;

        let mut reports = collect_reports(live, report_rx, tasks).await?;
        reports.sort_by_key(|report| report.address);

        let mut active = false;
        for NodeReport { address, outcome } in reports {
            let node_round =
                outcome.map_err(|source| TopologyError::Machine { index: address, source })?;

            if node_round.completion.is_halted() {
                warn!("node {} halted in round {}", address, round);
                live -= 1;
            }

            active |= node_round.active;
            for packet in node_round.packets {
                if packet.destination == config.nat_address {
                    nat.capture(packet);
                } else if let Some(input) = routes.get(&packet.destination) {
                    packet.deliver(input.value());
                    delivered += 1;
                } else {
                    warn!(
                        "dropping packet from node {} to unknown address: {}",
                        address, packet
                    );
                    dropped += 1;
                }
            }
        }

        if active {
            idle = 0;
            continue;
        }

        idle += 1;
        if idle < config.idle_rounds {
            continue;
        }

        let Some(packet) = nat.latest else {
            continue;
        };

        if nat.last_sent.is_some_and(|last| last.y == packet.y) {
            info!(
                "NAT sent y={} twice in a row after {} rounds",
                packet.y, round
            );
            return Ok(NetworkReport {
                first_nat_packet: nat.first.unwrap_or(packet),
                repeated_packet: packet,
                rounds: round,
                delivered,
                dropped,
            });
        }

        debug!("network idle in round {}, NAT wakes node 0 with {}", round, packet);
        if let Some(input) = routes.get(&0) {
            packet.deliver(input.value());
            delivered += 1;
        }
        nat.last_sent = Some(packet);
        idle = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Sends `(255, address, address * 10)` once, then reads input forever.
    const BEACON: &[i64] = &[
        3, 100, 104, 255, 4, 100, 1002, 100, 10, 101, 4, 101, 3, 102, 1105, 1, 12, 99,
    ];

    /// Node 0 sends `(1, 7, 8)`. Every node answers a received `(x, y)` with
    /// `(255, x + address, y)` and skips `-1`.
    const RELAY: &[i64] = &[
        3, 100, 1005, 100, 11, 104, 1, 104, 7, 104, 8, 3, 101, 1008, 101, -1, 103, 1005, 103, 11,
        3, 102, 104, 255, 1, 101, 100, 104, 4, 104, 4, 102, 1105, 1, 11, 99,
    ];

    fn config(size: usize) -> NetworkConfig {
        NetworkConfig {
            size,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let config = NetworkConfig::default();
        assert_eq!(config.size, 50);
        assert_eq!(config.nat_address, 255);
        assert_eq!(config.idle_rounds, 1);
        assert!(config.max_rounds.is_none());
    }

    #[tokio::test]
    async fn nat_wakes_idle_network_until_repeat() {
        let report = run_network(&Program::from(BEACON), &config(3))
            .await
            .unwrap();

        assert_eq!(report.first_nat_packet, Packet::new(255, 0, 0));
        assert_eq!(report.repeated_packet, Packet::new(255, 2, 20));
        assert_eq!(report.rounds, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 0);
    }

    #[tokio::test]
    async fn packets_are_routed_between_nodes() {
        let report = run_network(&Program::from(RELAY), &config(2))
            .await
            .unwrap();

        assert_eq!(report.first_nat_packet, Packet::new(255, 8, 8));
        assert_eq!(report.repeated_packet, Packet::new(255, 8, 8));
        assert_eq!(report.rounds, 5);
        // (1, 7, 8) to node 1, then one NAT wake-up
        assert_eq!(report.delivered, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn default_size_network_on_worker_threads() {
        let report = run_network(&Program::from(BEACON), &NetworkConfig::default())
            .await
            .unwrap();

        assert_eq!(report.first_nat_packet, Packet::new(255, 0, 0));
        assert_eq!(report.repeated_packet, Packet::new(255, 49, 490));
    }

    #[tokio::test]
    async fn custom_nat_address() {
        // Same beacon, but sending to 9
        let mut cells = BEACON.to_vec();
        cells[3] = 9;
        let config = NetworkConfig {
            size: 2,
            nat_address: 9,
            ..NetworkConfig::default()
        };

        let report = run_network(&Program::from(cells), &config).await.unwrap();
        assert_eq!(report.repeated_packet, Packet::new(9, 1, 10));
    }

    #[tokio::test]
    async fn unknown_destination_is_dropped() {
        // Sends to 77, which is neither a node nor the NAT
        let mut cells = BEACON.to_vec();
        cells[3] = 77;
        let config = NetworkConfig {
            size: 2,
            max_rounds: Some(4),
            ..NetworkConfig::default()
        };

        let err = run_network(&Program::from(cells), &config).await.unwrap_err();
        assert!(matches!(err, TopologyError::RoundLimit { rounds: 4 }));
    }

    #[tokio::test]
    async fn halted_network_stalls() {
        let err = run_network(&Program::from(&[3, 100, 99][..]), &config(4))
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::Stalled { rounds: 1 }));
    }

    #[tokio::test]
    async fn silent_network_hits_round_limit() {
        let config = NetworkConfig {
            size: 3,
            max_rounds: Some(10),
            ..NetworkConfig::default()
        };
        let err = run_network(&Program::from(&[3, 100, 3, 101, 1105, 1, 2][..]), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::RoundLimit { rounds: 10 }));
    }

    #[tokio::test]
    async fn failing_node_aborts_network() {
        let err = run_network(&Program::from(&[3, 100, 98][..]), &config(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TopologyError::Machine {
                index: 0,
                source: VMError::InvalidInstruction { opcode: 98, ip: 2 }
            }
        ));
    }

    #[tokio::test]
    async fn partial_packet_keeps_network_busy() {
        // Sends (255, 7, 7), then (0, 11) and only completes it with 12 one round
        // later, followed by (255, -1, -1). Node 0 then reads input forever.
        let cells = [
            3, 100, 104, 255, 104, 7, 104, 7, 3, 101, 104, 0, 104, 11, 3, 102, 104, 12, 104, 255, 4,
            102, 4, 102, 3, 103, 1105, 1, 24, 99,
        ];

        let report = run_network(&Program::from(&cells[..]), &config(1))
            .await
            .unwrap();

        assert_eq!(report.first_nat_packet, Packet::new(255, 7, 7));
        assert_eq!(report.repeated_packet, Packet::new(255, -1, -1));
        assert_eq!(report.rounds, 5);
        // (0, 11, 12) to node 0, then one NAT wake-up
        assert_eq!(report.delivered, 2);
    }

    #[tokio::test]
    async fn single_failing_node_ends_the_run() {
        // Node 0 writes to an address memory cannot grow to; the others wait.
        let cells = [3, 100, 1005, 100, 9, 1101, 1, 1, i64::MAX, 3, 101, 1105, 1, 9];

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            run_network(&Program::from(&cells[..]), &config(3)),
        )
        .await
        .expect("network did not stop")
        .unwrap_err();

        assert!(matches!(
            err,
            TopologyError::Machine {
                index: 0,
                source: VMError::OutOfMemory {
                    address: i64::MAX,
                    ip: 5
                }
            }
        ));
    }

    #[tokio::test]
    async fn panicked_node_task_fails_the_round() {
        let (report_tx, mut report_rx) = mpsc::channel(2);
        let mut tasks = JoinSet::new();

        let waiting = report_tx.clone();
        tasks.spawn(async move {
            let _waiting = waiting;
            std::future::pending::<()>().await;
        });
        tasks.spawn(async move {
            let _reports = report_tx;
            panic!("node crashed");
        });

        let err = collect_reports(2, &mut report_rx, &mut tasks)
            .await
            .err()
            .expect("collection should fail");
        match err {
            TopologyError::TaskFailed(message) => assert!(message.contains("panicked")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_configs_rejected() {
        let program = Program::from(BEACON);
        for config in [
            NetworkConfig {
                size: 0,
                ..NetworkConfig::default()
            },
            NetworkConfig {
                size: 10,
                nat_address: 3,
                ..NetworkConfig::default()
            },
            NetworkConfig {
                idle_rounds: 0,
                ..NetworkConfig::default()
            },
        ] {
            assert!(matches!(
                run_network(&program, &config).await,
                Err(TopologyError::InvalidConfig(_))
            ));
        }
    }
}
