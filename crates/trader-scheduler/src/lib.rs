//! Recurring market jobs
//!
//! Three independent jobs run on one scheduler loop:
//!
//! - **price sync** refreshes every tracked instrument from one batched quote
//!   lookup
//! - **analysis** computes indicators per instrument, composes a prompt and
//!   asks the agent for an assessment; at most one cycle is in flight
//! - **snapshot** copies every user's balance once a day
//!
//! [`AnalysisScheduler::tick`] runs a single job once, which is what the CLI
//! and the tests use. [`AnalysisScheduler::run`] drives the job table until
//! shutdown.

pub mod analysis;
pub mod config;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod persistence;
pub mod scheduler;

pub use analysis::{AnalysisPipeline, AnalysisResult};
pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use guard::{FlightPermit, SingleFlight};
pub use jobs::{AnalysisReport, PriceSyncReport, SnapshotReport};
pub use persistence::{
    Balance, BalanceSnapshot, InMemoryStore, Instrument, PersistenceGateway, Role, User,
};
pub use scheduler::{AnalysisScheduler, JobKind, JobReport, Trigger};
