use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{ConfigError, RelayConfig};
use crate::driver::StreamDriver;
use crate::io::IoScheduler;
use crate::orchestrator::{TransferPhase, TransferReport, drain, read_chunk, write_chunk};
use crate::protocol::RelayError;
use crate::resource::{HttpManager, Resource};
use crate::ensure;

/// Drives one resource through a full receive-then-forward cycle.
///
/// Every received chunk is written back to the same resource; once the input
/// is exhausted the outbound side is drained and the resource's result code
/// becomes the run's result.
#[derive(Debug)]
pub struct TransferOrchestrator<R, M> {
    resource: Arc<R>,
    manager: Arc<M>,
    scheduler: IoScheduler,
    config: RelayConfig,
    phase: TransferPhase,
    report: TransferReport,
}

impl<R, M> TransferOrchestrator<R, M>
where
    R: Resource,
    M: HttpManager<R>,
{
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn new(resource: Arc<R>, manager: Arc<M>, scheduler: IoScheduler, config: RelayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { resource, manager, scheduler, config, phase: TransferPhase::Init, report: TransferReport::default() })
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn report(&self) -> TransferReport {
        self.report
    }

    /// Runs the transfer to completion.
    ///
    /// # Errors
    ///
    /// The first error raised by the driver; no later phase runs after it.
    pub async fn run(&mut self) -> Result<TransferReport, RelayError> {
        ensure!(self.phase == TransferPhase::Init, RelayError::invalid_state("transfer already ran"));

        let mut driver =
            StreamDriver::new(Arc::clone(&self.resource), Arc::clone(&self.manager), self.scheduler.clone(), self.config);

        match self.drive(&mut driver).await {
            Ok(()) => {
                self.phase = TransferPhase::Done;
                info!(bytes = self.report.bytes_read, chunks = self.report.chunks, "transfer finished");
                Ok(self.report)
            }
            Err(e) => {
                self.phase = TransferPhase::Failed(e.code());
                error!(code = e.code(), cause = %e, "transfer failed");
                Err(e)
            }
        }
    }

    async fn drive(&mut self, driver: &mut StreamDriver<R, M>) -> Result<(), RelayError> {
        driver.init()?;

        loop {
            self.phase = TransferPhase::Reading;
            let chunk = read_chunk(driver, self.config.read_chunk_size(), &mut self.report).await?;
            debug!(size = chunk.len(), "read chunk");
            if chunk.is_empty() {
                break;
            }

            self.report.bytes_read += chunk.len() as u64;
            self.report.chunks += 1;

            self.phase = TransferPhase::Writing;
            write_chunk(driver, &chunk, &mut self.report).await?;
            debug!(size = chunk.len(), "wrote chunk");
        }

        self.phase = TransferPhase::Draining;
        self.report.result_code = drain(driver).await?;
        Ok(())
    }
}
