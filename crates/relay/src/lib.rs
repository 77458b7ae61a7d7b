//! Resumable stream drivers and splice orchestration over asynchronous HTTP resources
//!
//! This crate moves bytes between one or two live HTTP resources: it pulls
//! from a source, pushes to a sink, or splices a source into a sink. The
//! HTTP stack itself stays outside: resources and the manager executing them
//! are plugged in through the [`resource::Resource`] and
//! [`resource::HttpManager`] traits, and the network layer hands received
//! bytes over through an [`io::AsyncDataBuffer`].
//!
//! # Features
//!
//! - Re-enterable `read`, `write` and `drain_writes` per resource
//! - Explicit, minimal suspension points driven by io tokens
//! - Thread-safe handoff of received bytes from network threads
//! - Send window backpressure on the outbound path
//! - Ordered response header propagation during splice
//! - Scoped ownership: drivers, buffers and tokens are released on every exit path
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use micro_relay::config::RelayConfig;
//! use micro_relay::io::IoScheduler;
//! use micro_relay::orchestrator::SpliceOrchestrator;
//! use micro_relay::resource::loopback::{LoopbackManager, LoopbackResource};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = IoScheduler::new();
//!     let source = Arc::new(
//!         LoopbackResource::new(scheduler.clone()).with_response_headers([("Content-Length", "5")]),
//!     );
//!     let sink = Arc::new(LoopbackResource::new(scheduler.clone()).complete_on_finish_write());
//!
//!     source.deliver(Bytes::from_static(b"hello"));
//!     source.complete(0);
//!
//!     let manager = Arc::new(LoopbackManager::new());
//!     let mut splice = SpliceOrchestrator::new(source, Arc::clone(&sink), manager, scheduler, RelayConfig::default())
//!         .expect("valid config");
//!
//!     match splice.run().await {
//!         Ok(report) => println!("spliced {} bytes", report.total_bytes()),
//!         Err(e) => eprintln!("splice failed with code {}", e.code()),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: io tokens, resource states, header translation and errors
//! - [`io`]: the io scheduler and the cross-thread data buffer
//! - [`resource`]: collaborator traits and an in-process loopback implementation
//! - [`driver`]: the per-resource [`driver::StreamDriver`]
//! - [`orchestrator`]: transfer and splice orchestrators
//! - [`config`]: tunables
//!
//! # Suspension Points
//!
//! A driver suspends in exactly three places: waiting for received bytes
//! inside `read`, yielding after a submission (or waiting for send window)
//! inside `write`, and waiting for completion inside `drain_writes`. Between
//! these points everything runs to completion on the driving task.
//!
//! # Error Handling
//!
//! Every failure is a [`protocol::RelayError`] carrying one numeric code.
//! Drivers never recover from an error; orchestrators abort on the first one
//! and keep its code in [`orchestrator::TransferPhase::Failed`].

pub mod config;
pub mod driver;
pub mod io;
pub mod orchestrator;
pub mod protocol;
pub mod resource;

mod utils;
pub(crate) use utils::ensure;
