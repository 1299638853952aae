//! Private rayon pools for the two fan-out phases.
//!
//! Never the global pool: fetch workers spend their time blocked on the
//! archive, and parking them on the global pool would starve unrelated
//! CPU work in the same process.

use crate::config::PoolConfig;
use crate::error::AcquireError;

pub struct WorkerPools {
    /// Bounds concurrent in-flight archive requests.
    pub fetch: rayon::ThreadPool,
    /// Sized for CPU-bound decoding.
    pub decode: rayon::ThreadPool,
}

impl WorkerPools {
    pub fn new(config: &PoolConfig) -> Result<Self, AcquireError> {
        if config.fetch_threads == 0 {
            return Err(AcquireError::Pool("fetch pool needs at least one thread".into()));
        }
        let fetch = rayon::ThreadPoolBuilder::new()
            .num_threads(config.fetch_threads)
            .thread_name(|i| format!("timber-fetch-{i}"))
            .build()
            .map_err(|e| AcquireError::Pool(e.to_string()))?;
        // rayon treats 0 as "one per core"
        let decode = rayon::ThreadPoolBuilder::new()
            .num_threads(config.decode_threads)
            .thread_name(|i| format!("timber-decode-{i}"))
            .build()
            .map_err(|e| AcquireError::Pool(e.to_string()))?;
        Ok(Self { fetch, decode })
    }
}
