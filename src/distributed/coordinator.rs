//! Distributed coordinator
//!
//! This module implements the coordinator for distributed mode.
//! The coordinator:
//! - Partitions the search and assigns task i to node `i % nodes`
//! - Connects to every node that has work and sends its assignment
//! - Reads results from all nodes concurrently
//! - Merges them by worker id with the same [`Gatherer`] as local mode
//!
//! There is no retry or reassignment. Any node error, dropped connection or
//! timeout fails the whole search.

use crate::config::Config;
use crate::coordinator::gather::{FinalResult, Gatherer, PartialResult};
use crate::coordinator::local::RunReport;
use crate::distributed::protocol::*;
use crate::error::PrimeError;
use crate::partition::{ScanTask, WorkerId};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a connection reader reports back to the gather loop
#[derive(Debug)]
enum NodeEvent {
    Result { node: usize, partial: PartialResult },
    Done { node: usize, duration_ns: u64 },
    Failed { node: usize, worker_id: Option<WorkerId>, error: String },
}

/// Distributed coordinator
///
/// Orchestrates a search across multiple node services.
pub struct DistributedCoordinator {
    /// Run configuration
    config: Arc<Config>,

    /// List of node addresses (IP:port)
    node_addresses: Vec<String>,
}

impl DistributedCoordinator {
    /// Create a new distributed coordinator
    pub fn new(config: Arc<Config>, node_addresses: Vec<String>) -> Result<Self> {
        if node_addresses.is_empty() {
            anyhow::bail!("No nodes specified for distributed mode");
        }

        Ok(Self {
            config,
            node_addresses,
        })
    }

    /// Run the distributed search
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();

        // Fail fast, before any connection is opened
        let bounds = self.config.bounds()?;
        let tasks = bounds.tasks()?;
        let assignments = assign_tasks(&tasks, self.node_addresses.len());

        tracing::info!(
            limit = bounds.limit,
            workers = bounds.workers,
            nodes = self.node_addresses.len(),
            "Starting distributed search"
        );

        let mut connections = Vec::new();
        let nodes = self.node_addresses.iter().zip(assignments).enumerate();
        for (node, (addr, node_tasks)) in nodes {
            if node_tasks.is_empty() {
                tracing::info!(node, %addr, "No ranges for node, skipping");
                continue;
            }
            let stream = self.start_node(node, addr, node_tasks).await?;
            connections.push((node, stream));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let readers: Vec<JoinHandle<()>> = connections
            .into_iter()
            .map(|(node, stream)| tokio::spawn(read_node_events(node, stream, tx.clone())))
            .collect();
        // Only readers hold senders, so the channel closes once they all stop
        drop(tx);

        let gathered = self.gather(rx, &tasks).await;

        for reader in &readers {
            reader.abort();
        }

        let result = gathered?;
        let elapsed = started.elapsed();

        tracing::info!(
            primes = result.count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Distributed search complete"
        );

        Ok(RunReport { result, elapsed })
    }

    /// Connect to one node, send its assignment and wait for ACCEPTED
    async fn start_node(
        &self,
        node: usize,
        addr: &str,
        tasks: Vec<ScanTask>,
    ) -> Result<TcpStream> {
        tracing::info!(node, %addr, tasks = tasks.len(), "Connecting to node");

        let mut stream = TcpStream::connect(addr).await
            .with_context(|| format!("Failed to connect to {}", addr))?;

        let assign = AssignMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: addr.to_string(),
            scanner: self.config.search.scanner,
            threads: self.config.executor.threads,
            tasks,
        };
        write_message(&mut stream, &Message::Assign(assign)).await
            .with_context(|| format!("Failed to send assignment to {}", addr))?;

        match read_message(&mut stream).await
            .with_context(|| format!("Failed to read reply from {}", addr))?
        {
            Message::Accepted(accepted) => {
                if accepted.protocol_version != PROTOCOL_VERSION {
                    anyhow::bail!(
                        "Protocol version mismatch with {}: coordinator={}, node={}",
                        addr, PROTOCOL_VERSION, accepted.protocol_version
                    );
                }
                tracing::info!(
                    node,
                    node_id = %accepted.node_id,
                    tasks = accepted.num_tasks,
                    threads = accepted.threads,
                    "Node accepted assignment"
                );
                Ok(stream)
            }
            Message::Error(error) => {
                anyhow::bail!(
                    "Node {} ({}) rejected assignment: {}",
                    addr, error.node_id, error.error
                )
            }
            other => anyhow::bail!("Expected ACCEPTED from {}, got {}", addr, other.kind()),
        }
    }

    /// Wait for every worker's result, honoring the optional timeout
    ///
    /// Each result must cover exactly the range its worker was assigned.
    async fn gather(
        &self,
        mut rx: mpsc::UnboundedReceiver<NodeEvent>,
        tasks: &[ScanTask],
    ) -> Result<FinalResult> {
        let timeout_secs = self.config.runtime.result_timeout_secs;
        let deadline = (timeout_secs > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout_secs));

        let workers = tasks.len();
        let mut gatherer = Gatherer::for_tasks(tasks);

        while !gatherer.is_complete() {
            let event = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        return Err(PrimeError::Timeout {
                            secs: timeout_secs,
                            missing: gatherer.missing(),
                        }
                        .into())
                    }
                },
                None => rx.recv().await,
            };

            match event {
                Some(NodeEvent::Result { node, partial }) => {
                    tracing::debug!(
                        node,
                        worker_id = partial.worker_id,
                        found = partial.primes.len(),
                        received = gatherer.received() + 1,
                        expected = workers,
                        "Result received"
                    );
                    gatherer
                        .add(partial)
                        .with_context(|| format!("Bad result from {}", self.node_addresses[node]))?;
                }
                Some(NodeEvent::Done { node, duration_ns }) => {
                    tracing::info!(
                        node,
                        addr = %self.node_addresses[node],
                        elapsed_ms = duration_ns / 1_000_000,
                        "Node finished"
                    );
                }
                Some(NodeEvent::Failed { node, worker_id: Some(worker_id), error }) => {
                    return Err(anyhow::Error::new(PrimeError::WorkerFailure {
                        worker_id,
                        reason: error,
                    })
                    .context(format!("Node {} failed", self.node_addresses[node])));
                }
                Some(NodeEvent::Failed { node, worker_id: None, error }) => {
                    return Err(anyhow::Error::new(PrimeError::Incomplete {
                        missing: gatherer.missing(),
                    })
                    .context(format!("Node {} failed: {}", self.node_addresses[node], error)));
                }
                None => {
                    return Err(PrimeError::Incomplete {
                        missing: gatherer.missing(),
                    }
                    .into())
                }
            }
        }

        Ok(gatherer.finish()?)
    }
}

/// Static assignment: task i goes to node `i % nodes`
pub fn assign_tasks(tasks: &[ScanTask], nodes: usize) -> Vec<Vec<ScanTask>> {
    let mut assignments = vec![Vec::new(); nodes];
    if nodes == 0 {
        return assignments;
    }
    for (i, task) in tasks.iter().enumerate() {
        assignments[i % nodes].push(*task);
    }
    assignments
}

/// Forward every message from one node until DONE, ERROR or disconnect
async fn read_node_events(
    node: usize,
    mut stream: TcpStream,
    tx: mpsc::UnboundedSender<NodeEvent>,
) {
    loop {
        let event = match read_message(&mut stream).await {
            Ok(Message::Result(partial)) => NodeEvent::Result { node, partial },
            Ok(Message::Done(done)) => {
                let _ = tx.send(NodeEvent::Done {
                    node,
                    duration_ns: done.duration_ns,
                });
                return;
            }
            Ok(Message::Error(error)) => NodeEvent::Failed {
                node,
                worker_id: error.worker_id,
                error: error.error,
            },
            Ok(other) => NodeEvent::Failed {
                node,
                worker_id: None,
                error: format!("unexpected {} message", other.kind()),
            },
            Err(e) => NodeEvent::Failed {
                node,
                worker_id: None,
                error: format!("connection lost: {:#}", e),
            },
        };

        let stop = matches!(event, NodeEvent::Failed { .. });
        if tx.send(event).is_err() || stop {
            return;
        }
    }
}
