//! Node service for distributed mode
//!
//! This module implements the service that runs on each node in distributed mode.
//! The node service:
//! - Listens for connections from the coordinator
//! - Receives the ranges assigned to this node
//! - Scans them on a local executor
//! - Streams each partial result back as soon as it is ready
//!
//! One coordinator connection is served at a time.

use crate::coordinator::gather::TaskOutcome;
use crate::distributed::protocol::*;
use crate::executor::{Executor, RayonExecutor, ThreadExecutor};
use crate::partition::{ScanTask, WorkerId};
use crate::scanner::create_scanner;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Node service
///
/// Runs on each node in distributed mode, accepting work from the coordinator.
pub struct NodeService {
    /// Port to listen on
    listen_port: u16,

    /// Node identifier (hostname)
    node_id: String,
}

impl NodeService {
    /// Create a new node service
    pub fn new(listen_port: u16) -> Result<Self> {
        let node_id = get_node_id()?;

        Ok(Self {
            listen_port,
            node_id,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Bind the listening socket
    ///
    /// Port 0 picks a free port; read it back from the listener.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("0.0.0.0:{}", self.listen_port);
        TcpListener::bind(&addr).await
            .with_context(|| format!("Failed to bind node service on {}", addr))
    }

    /// Run the node service
    ///
    /// Listens for connections from the coordinator and serves them forever.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve coordinator connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr().context("Failed to read listener address")?;
        tracing::info!(
            addr = %local_addr,
            node_id = %self.node_id,
            "Node service listening"
        );

        loop {
            let (stream, addr) = listener.accept().await
                .context("Failed to accept connection")?;

            tracing::info!(%addr, "Coordinator connected");

            // Blocks until this assignment is finished
            if let Err(e) = self.handle_assignment(stream).await {
                tracing::warn!("Assignment failed: {:#}", e);
            }

            tracing::info!("Assignment complete, waiting for next connection");
        }
    }

    /// Handle a single assignment from a coordinator
    async fn handle_assignment(&self, mut stream: TcpStream) -> Result<()> {
        let assign = match read_message(&mut stream).await? {
            Message::Assign(assign) => assign,
            other => {
                let error = format!("Expected ASSIGN message, got {}", other.kind());
                self.send_error(&mut stream, None, error.clone()).await?;
                anyhow::bail!(error)
            }
        };

        if assign.protocol_version != PROTOCOL_VERSION {
            let error = format!(
                "Protocol version mismatch: coordinator={}, node={}",
                assign.protocol_version, PROTOCOL_VERSION
            );
            self.send_error(&mut stream, None, error).await?;
            anyhow::bail!("Protocol version mismatch");
        }

        let num_tasks = assign.tasks.len();
        let scanner = create_scanner(assign.scanner);
        let (executor, threads): (Arc<dyn Executor>, usize) = match assign.threads {
            Some(threads) => match RayonExecutor::new(scanner, threads) {
                Ok(executor) => {
                    let threads = executor.threads();
                    (Arc::new(executor), threads)
                }
                Err(e) => {
                    self.send_error(&mut stream, None, format!("{:#}", e)).await?;
                    return Err(e);
                }
            },
            None => (Arc::new(ThreadExecutor::new(scanner)), num_tasks),
        };

        tracing::info!(
            coordinator_node_id = %assign.node_id,
            tasks = num_tasks,
            threads,
            scanner = assign.scanner.as_str(),
            executor = executor.name(),
            "Received assignment"
        );

        let accepted = AcceptedMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: self.node_id.clone(),
            num_tasks,
            threads,
        };
        write_message(&mut stream, &Message::Accepted(accepted)).await?;

        let started = Instant::now();
        self.run_tasks(&mut stream, executor, assign.tasks).await?;

        tracing::info!(
            tasks = num_tasks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "All results sent"
        );

        Ok(())
    }

    /// Scan `tasks` on `executor` and stream every outcome, then DONE
    ///
    /// A failed or lost worker is reported as ERROR with its worker id and
    /// ends the assignment.
    async fn run_tasks<S>(
        &self,
        stream: &mut S,
        executor: Arc<dyn Executor>,
        tasks: Vec<ScanTask>,
    ) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let mut expected: BTreeSet<WorkerId> = tasks.iter().map(|t| t.worker_id).collect();

        // Executors report on a blocking channel; forward onto an async one
        // so results can be written to the socket as they complete.
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<TaskOutcome>();
        let forward = tokio::task::spawn_blocking(move || -> Result<()> {
            let (tx, rx) = crossbeam::channel::unbounded();
            for task in tasks {
                executor.submit(task, tx.clone())?;
            }
            drop(tx);
            for outcome in rx {
                if out_tx.send(outcome).is_err() {
                    break;
                }
            }
            Ok(())
        });

        while let Some(outcome) = out_rx.recv().await {
            match outcome {
                Ok(partial) => {
                    expected.remove(&partial.worker_id);
                    tracing::debug!(
                        worker_id = partial.worker_id,
                        found = partial.primes.len(),
                        "Sending result"
                    );
                    write_message(stream, &Message::Result(partial)).await?;
                }
                Err(failure) => {
                    let reason = failure.reason.clone();
                    self.send_error(stream, Some(failure.worker_id), reason).await?;
                    anyhow::bail!("Worker {} failed: {}", failure.worker_id, failure.reason);
                }
            }
        }

        let forwarded = forward.await.context("Result forwarding task panicked")?;
        if let Err(e) = forwarded {
            self.send_error(stream, None, format!("{:#}", e)).await?;
            return Err(e);
        }

        if let Some(&worker_id) = expected.iter().next() {
            let error = format!("No result for worker(s) {:?}", expected);
            self.send_error(stream, Some(worker_id), error.clone()).await?;
            anyhow::bail!(error);
        }

        let done = DoneMessage {
            node_id: self.node_id.clone(),
            duration_ns: started.elapsed().as_nanos() as u64,
        };
        write_message(stream, &Message::Done(done)).await
    }

    async fn send_error<S>(
        &self,
        stream: &mut S,
        worker_id: Option<WorkerId>,
        error: String,
    ) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let msg = Message::Error(ErrorMessage {
            node_id: self.node_id.clone(),
            worker_id,
            error,
        });
        write_message(stream, &msg).await
    }
}

/// Get node identifier (hostname)
fn get_node_id() -> Result<String> {
    if let Ok(hostname) = hostname::get() {
        if let Ok(hostname_str) = hostname.into_string() {
            return Ok(hostname_str);
        }
    }

    // Fall back to "unknown"
    Ok("unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{Delivery, MockExecutor};
    use crate::partition::{Range, SearchBounds};
    use crate::scanner::ScannerKind;

    async fn start_service() -> std::net::SocketAddr {
        let service = NodeService::new(0).unwrap();
        let listener = service.bind().await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { service.serve(listener).await });
        std::net::SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn assign(tasks: Vec<ScanTask>, threads: Option<usize>) -> Message {
        Message::Assign(AssignMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: "test".to_string(),
            scanner: ScannerKind::TrialDivision,
            threads,
            tasks,
        })
    }

    #[tokio::test]
    async fn test_service_scans_assigned_tasks() {
        let addr = start_service().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let tasks = vec![
            ScanTask { worker_id: 0, range: Range::new(0, 10) },
            ScanTask { worker_id: 2, range: Range::new(20, 30) },
        ];
        write_message(&mut stream, &assign(tasks, Some(2))).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Accepted(accepted) => {
                assert_eq!(accepted.num_tasks, 2);
                assert_eq!(accepted.threads, 2);
            }
            other => panic!("Expected ACCEPTED, got {:?}", other),
        }

        let mut results = Vec::new();
        loop {
            match read_message(&mut stream).await.unwrap() {
                Message::Result(partial) => results.push(partial),
                Message::Done(_) => break,
                other => panic!("Unexpected message {:?}", other),
            }
        }

        results.sort_by_key(|p| p.worker_id);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].primes, vec![2, 3, 5, 7]);
        assert_eq!(results[1].worker_id, 2);
        assert_eq!(results[1].primes, vec![23, 29]);
    }

    #[tokio::test]
    async fn test_service_rejects_version_mismatch() {
        let addr = start_service().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let msg = Message::Assign(AssignMessage {
            protocol_version: PROTOCOL_VERSION + 1,
            node_id: "test".to_string(),
            scanner: ScannerKind::TrialDivision,
            threads: None,
            tasks: vec![],
        });
        write_message(&mut stream, &msg).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Error(error) => assert!(error.error.contains("Protocol version mismatch")),
            other => panic!("Expected ERROR, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_rejects_unexpected_first_message() {
        let addr = start_service().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let msg = Message::Done(DoneMessage {
            node_id: "x".to_string(),
            duration_ns: 0,
        });
        write_message(&mut stream, &msg).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Message::Error(error) => assert!(error.error.contains("Expected ASSIGN")),
            other => panic!("Expected ERROR, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_empty_assignment() {
        let addr = start_service().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        write_message(&mut stream, &assign(vec![], None)).await.unwrap();
        assert!(matches!(read_message(&mut stream).await.unwrap(), Message::Accepted(_)));
        assert!(matches!(read_message(&mut stream).await.unwrap(), Message::Done(_)));
    }

    /// Run `executor` over N=30, W=3 into an in-memory pipe and read back
    /// everything the node wrote
    async fn run_on_pipe(executor: MockExecutor) -> (Result<()>, Vec<Message>) {
        let service = NodeService::new(0).unwrap();
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let tasks = SearchBounds::new(30, 3).unwrap().tasks().unwrap();

        let outcome = service.run_tasks(&mut server, Arc::new(executor), tasks).await;
        drop(server);

        let mut messages = Vec::new();
        while let Ok(msg) = read_message(&mut client).await {
            messages.push(msg);
        }
        (outcome, messages)
    }

    fn mock() -> MockExecutor {
        MockExecutor::new(create_scanner(ScannerKind::TrialDivision))
            .with_delivery(Delivery::Immediate)
    }

    #[tokio::test]
    async fn test_run_tasks_streams_results_then_done() {
        let (outcome, messages) = run_on_pipe(mock()).await;
        assert!(outcome.is_ok());
        assert_eq!(messages.len(), 4);
        assert!(messages[..3].iter().all(|m| matches!(m, Message::Result(_))));
        assert!(matches!(messages[3], Message::Done(_)));
    }

    #[tokio::test]
    async fn test_run_tasks_forwards_worker_failure() {
        let (outcome, messages) = run_on_pipe(mock().fail_worker(1)).await;
        assert!(outcome.is_err());

        match &messages[..] {
            [Message::Result(first), Message::Error(error)] => {
                assert_eq!(first.worker_id, 0);
                assert_eq!(error.worker_id, Some(1));
                assert_eq!(error.error, "mock failure");
            }
            other => panic!("Expected RESULT then ERROR, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_tasks_reports_lost_worker() {
        let (outcome, messages) = run_on_pipe(mock().drop_worker(2)).await;
        assert!(outcome.is_err());

        match messages.last() {
            Some(Message::Error(error)) => {
                assert_eq!(error.worker_id, Some(2));
                assert!(error.error.contains("No result"));
            }
            other => panic!("Expected ERROR, got {:?}", other),
        }
        assert!(!messages.iter().any(|m| matches!(m, Message::Done(_))));
    }
}
