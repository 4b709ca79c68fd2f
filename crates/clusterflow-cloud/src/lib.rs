//! ClusterFlow Cloud Infrastructure
//!
//! This crate provides the provider-neutral core of ClusterFlow: the
//! lifecycle trait every managed resource type implements, the local state
//! file, and the status convergence waiter shared by all resource adapters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 ClusterFlow CLI                  │
//! │        (clusterflow user create/delete)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               clusterflow-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Resource Abstraction             │   │
//! │  │  trait ResourceAdapter { ... }            │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │    Waiter    │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │  ovh public   │
//! │ cloud adapter │
//! └───────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod state;
pub mod waiter;

// Re-exports
pub use error::{CloudError, Result};
pub use provider::{ResourceAdapter, ResourceConfig, Timeouts};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
pub use waiter::{Convergence, Observation, PollConfig, PollTarget, StatusSource, wait_until};
