//! Infrastructure adapters: the job store contract and reference backends.

pub mod store;

pub use store::memory::InMemoryJobStore;
pub use store::JobStore;
