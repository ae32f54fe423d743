//! Per-round driver task

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{RaceError, RaceResult};

use super::message::{DriverMessage, StartBenchmark};

/// Executes the benchmark of one round
///
/// A driver receives exactly one `StartBenchmark` and answers with a
/// terminal message. It runs on its own task and is dropped afterwards.
#[async_trait]
pub trait Driver: Send + 'static {
    /// Handle a message and produce the reply
    async fn receive(&mut self, message: DriverMessage) -> DriverMessage;
}

/// Creates a fresh driver for every round
pub trait DriverFactory: Send + Sync {
    /// Create a driver with clean state
    fn create(&self) -> Box<dyn Driver>;
}

impl<F> DriverFactory for F
where
    F: Fn() -> Box<dyn Driver> + Send + Sync,
{
    fn create(&self) -> Box<dyn Driver> {
        self()
    }
}

/// Lifecycle of a round execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Created, not yet started
    Idle,
    /// Waiting for the driver's reply
    Running,
    /// The driver reported completion
    Completed,
    /// The driver failed, answered out of protocol, or never answered
    Failed,
}

/// Runs one round on a dedicated driver task
pub struct RoundExecution {
    round: usize,
    state: RoundState,
    driver: Option<Box<dyn Driver>>,
}

impl RoundExecution {
    /// Create an idle execution for the given round
    pub fn new(round: usize, driver: Box<dyn Driver>) -> Self {
        Self {
            round,
            state: RoundState::Idle,
            driver: Some(driver),
        }
    }

    /// Round index
    pub fn round(&self) -> usize {
        self.round
    }

    /// Current state
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Start the round and wait for the driver's reply
    ///
    /// Spawns the driver, sends it `StartBenchmark` and suspends until it
    /// answers. There is no timeout. The raw reply is returned; use
    /// [`RoundResult::try_from`](super::RoundResult) to validate it.
    ///
    /// # Errors
    ///
    /// Returns a protocol violation if this execution was already started or
    /// if the driver terminated without answering.
    pub async fn start(&mut self, request: StartBenchmark) -> RaceResult<DriverMessage> {
        let Some(mut driver) = self.driver.take() else {
            return Err(RaceError::protocol(format!(
                "Round {} was already started; drivers are never reused.",
                self.round
            )));
        };

        self.state = RoundState::Running;
        tracing::debug!(round = self.round, "Starting driver");

        let (reply_tx, reply_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let reply = driver.receive(DriverMessage::StartBenchmark(request)).await;
            // The asker only goes away if the race itself was dropped
            let _ = reply_tx.send(reply);
        });

        let reply = reply_rx.await;

        if let Err(e) = handle.await {
            tracing::error!(round = self.round, error = %e, "Driver task panicked");
        }

        match reply {
            Ok(reply) => {
                self.state = match reply {
                    DriverMessage::BenchmarkComplete { .. } => RoundState::Completed,
                    _ => RoundState::Failed,
                };
                tracing::debug!(
                    round = self.round,
                    reply = reply.kind(),
                    "Driver answered"
                );
                Ok(reply)
            }
            Err(_) => {
                self.state = RoundState::Failed;
                Err(RaceError::protocol(format!(
                    "Driver of round {} terminated without a response. Terminating race without result.",
                    self.round
                )))
            }
        }
    }
}

impl std::fmt::Debug for RoundExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundExecution")
            .field("round", &self.round)
            .field("state", &self.state)
            .finish()
    }
}
