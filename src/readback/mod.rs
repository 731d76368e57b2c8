//! Staggered asynchronous readback of GPU results
//!
//! A buffer cannot stay mapped while the GPU writes it, so results are copied
//! into a small ring of staging buffers and mapped with `map_async`. The
//! scheduler only trusts a copy after a frame delay and after its map
//! callback fired, polling the device without ever waiting on it.

pub mod request;
pub mod scheduler;
pub mod staging_ring;

pub use request::{MapSignal, ReadbackQueue, ReadbackRequest};
pub use scheduler::{CompletedReadback, ReadbackScheduler};
pub use staging_ring::StagingRing;
