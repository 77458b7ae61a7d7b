//! Tunables shared by drivers and orchestrators.

use serde::Deserialize;
use thiserror::Error;

use crate::ensure;

/// Default upper bound of a single read, 4 MiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default outbound bytes allowed in flight before a write blocks, 16 MiB.
pub const DEFAULT_SEND_WINDOW: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    read_chunk_size: usize,
    send_window: usize,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("read_chunk_size must be positive")]
    ZeroReadChunkSize,
    #[error("send_window must be positive")]
    ZeroSendWindow,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { read_chunk_size: DEFAULT_READ_CHUNK_SIZE, send_window: DEFAULT_SEND_WINDOW }
    }
}

impl RelayConfig {
    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    pub fn with_send_window(mut self, send_window: usize) -> Self {
        self.send_window = send_window;
        self
    }

    /// Maximum bytes claimed by one read.
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    /// Outbound bytes allowed in flight before a write waits for the network.
    pub fn send_window(&self) -> usize {
        self.send_window
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.read_chunk_size > 0, ConfigError::ZeroReadChunkSize);
        ensure!(self.send_window > 0, ConfigError::ZeroSendWindow);
        Ok(())
    }
}
