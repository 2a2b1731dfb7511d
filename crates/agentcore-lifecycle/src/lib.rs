#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **agentcore-lifecycle** – the authoritative lifecycle state machine for
//! the Agent Lifecycle & Runtime Core.
//!
//! `LifecycleManager` exclusively owns every `ManagedAgent` record, mirroring
//! `toka-orchestration::OrchestrationEngine`'s `DashMap`-backed concurrent
//! agent map and its `Arc<RwLock<SessionState>>`-style shared supervisor
//! state. Per-agent mutual exclusion is a `tokio::sync::Mutex` inside the
//! map entry rather than a global lock, so concurrent entry points never
//! block on unrelated agents. Health-check loops, the debounced usage
//! flush, and the birthday scheduler are modeled as supervised background
//! tasks the manager owns and cancels on `shutdown`, generalizing
//! `toka-orchestration::monitor::ProgressMonitor`'s task-tracking shape.

pub mod birthday;
pub mod flush;
pub mod health;
pub mod manager;

pub use birthday::BirthdayHook;
pub use manager::LifecycleManager;
