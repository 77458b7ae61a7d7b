use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{ConfigError, RelayConfig};
use crate::driver::StreamDriver;
use crate::io::IoScheduler;
use crate::orchestrator::{TransferPhase, TransferReport, drain, read_chunk, write_chunk};
use crate::protocol::RelayError;
use crate::protocol::header::split_length_header;
use crate::resource::{HttpManager, Resource};
use crate::ensure;

/// Counters of one splice run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SpliceReport {
    /// Read side counters plus the bytes the sink accepted
    pub transfer: TransferReport,
    /// Headers copied to the sink, the length header excluded
    pub headers_propagated: usize,
    /// Send length applied to the sink
    pub send_length: Option<u64>,
}

impl SpliceReport {
    /// Running total of bytes moved from source to sink.
    pub fn total_bytes(&self) -> u64 {
        self.transfer.bytes_read
    }
}

/// Copies a source resource into a sink resource.
///
/// The source is submitted right away. The sink is held back until the
/// first bytes of the response arrive: only then are the source's response
/// headers known, so they are copied over (the length header becomes the
/// sink's send length) before the sink is submitted and fed. A failure on
/// either side aborts the whole splice with that side's code.
#[derive(Debug)]
pub struct SpliceOrchestrator<R, M> {
    source: Arc<R>,
    sink: Arc<R>,
    manager: Arc<M>,
    scheduler: IoScheduler,
    config: RelayConfig,
    phase: TransferPhase,
    report: SpliceReport,
}

impl<R, M> SpliceOrchestrator<R, M>
where
    R: Resource,
    M: HttpManager<R>,
{
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn new(source: Arc<R>, sink: Arc<R>, manager: Arc<M>, scheduler: IoScheduler, config: RelayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { source, sink, manager, scheduler, config, phase: TransferPhase::Init, report: SpliceReport::default() })
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn report(&self) -> SpliceReport {
        self.report
    }

    /// Runs the splice to completion.
    ///
    /// # Errors
    ///
    /// The first error raised by either driver, or an invalid length header.
    pub async fn run(&mut self) -> Result<SpliceReport, RelayError> {
        ensure!(self.phase == TransferPhase::Init, RelayError::invalid_state("splice already ran"));

        let mut source = self.driver(Arc::clone(&self.source));
        let mut sink = self.driver(Arc::clone(&self.sink));

        match self.drive(&mut source, &mut sink).await {
            Ok(()) => {
                self.phase = TransferPhase::Done;
                info!(bytes = self.report.total_bytes(), chunks = self.report.transfer.chunks, "splice finished");
                Ok(self.report)
            }
            Err(e) => {
                self.phase = TransferPhase::Failed(e.code());
                error!(code = e.code(), cause = %e, "splice failed");
                Err(e)
            }
        }
    }

    fn driver(&self, resource: Arc<R>) -> StreamDriver<R, M> {
        StreamDriver::new(resource, Arc::clone(&self.manager), self.scheduler.clone(), self.config)
    }

    async fn drive(&mut self, source: &mut StreamDriver<R, M>, sink: &mut StreamDriver<R, M>) -> Result<(), RelayError> {
        source.init()?;

        loop {
            self.phase = TransferPhase::Reading;
            let chunk = read_chunk(source, self.config.read_chunk_size(), &mut self.report.transfer).await?;
            debug!(size = chunk.len(), "read chunk");
            if chunk.is_empty() {
                break;
            }

            if self.report.total_bytes() == 0 {
                self.start_sink(sink)?;
            }

            self.report.transfer.bytes_read += chunk.len() as u64;
            self.report.transfer.chunks += 1;

            self.phase = TransferPhase::Writing;
            write_chunk(sink, &chunk, &mut self.report.transfer).await?;
            debug!(size = chunk.len(), "wrote chunk");
        }

        // an empty body still needs its headers and length on the sink
        if !sink.is_initialized() {
            self.start_sink(sink)?;
        }

        self.phase = TransferPhase::Draining;
        self.report.transfer.result_code = drain(sink).await?;
        Ok(())
    }

    fn start_sink(&mut self, sink: &mut StreamDriver<R, M>) -> Result<(), RelayError> {
        let response_headers = self.source.response_headers();
        let splice_headers = split_length_header(&response_headers)?;

        if let Some(length) = splice_headers.send_length {
            self.sink.set_send_length(length);
        }
        for (name, value) in &splice_headers.headers {
            self.sink.append_header(name, value);
        }

        self.report.headers_propagated = splice_headers.headers.len();
        self.report.send_length = splice_headers.send_length;
        debug!(headers = splice_headers.headers.len(), send_length = ?splice_headers.send_length, "propagated response headers");

        sink.init()
    }
}
