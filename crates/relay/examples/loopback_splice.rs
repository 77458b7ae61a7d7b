use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use micro_relay::config::RelayConfig;
use micro_relay::io::IoScheduler;
use micro_relay::orchestrator::SpliceOrchestrator;
use micro_relay::resource::loopback::{LoopbackManager, LoopbackResource};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

const PARTS: [&[u8]; 3] = [b"hello, ", b"spliced ", b"world!\n"];

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let scheduler = IoScheduler::new();
    let length = PARTS.iter().map(|part| part.len()).sum::<usize>();
    let source = Arc::new(
        LoopbackResource::new(scheduler.clone())
            .with_response_headers([("Content-Type", "text/plain".to_string()), ("Content-Length", length.to_string())]),
    );
    let sink = Arc::new(LoopbackResource::new(scheduler.clone()).complete_on_finish_write());

    // plays the network: trickles the response in from another task
    let network = Arc::clone(&source);
    tokio::spawn(async move {
        for part in PARTS {
            tokio::time::sleep(Duration::from_millis(50)).await;
            network.deliver(Bytes::from_static(part));
        }
        network.complete(0);
    });

    let config = RelayConfig::default().with_read_chunk_size(8);
    let mut splice = match SpliceOrchestrator::new(source, Arc::clone(&sink), Arc::new(LoopbackManager::new()), scheduler, config) {
        Ok(splice) => splice,
        Err(e) => {
            error!(cause = %e, "invalid relay config");
            return;
        }
    };

    match splice.run().await {
        Ok(report) => {
            info!(bytes = report.total_bytes(), send_length = ?report.send_length, headers = ?sink.request_headers(), "splice done");
            info!(body = %String::from_utf8_lossy(&sink.sent()), "sink received");
        }
        Err(e) => error!(code = e.code(), cause = %e, "splice failed"),
    }
}
