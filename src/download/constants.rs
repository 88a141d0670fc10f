//! Constants for the download module (timeouts, chunking).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout: longest wait for the next piece of a response.
pub const IDLE_TIMEOUT_SECS: u64 = 60;

/// Bytes buffered in memory before they are written and flushed (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;
