//! # infrasim
//!
//! Discrete-time simulator of interacting infrastructure sectors
//! (agriculture, water, electricity, petroleum) over a country → region →
//! city hierarchy.
//!
//! ## Components
//!
//! - **domain**: facilities, lifecycles, commodity/sector vocabulary
//! - **sector**: per-node sector systems and their economics ledgers
//! - **society**: the node tree, roll-up queries and the tick/tock engine
//! - **allocator**: the per-sector network-flow LP and its write-back
//! - **driver**: the allocate → tick → tock round loop
//! - **scenario**: TOML construction surface
//! - **report**: per-iteration read-only snapshots
//!
//! One round settles simultaneously: every sector system computes its
//! economics from state committed in the previous round (tick), then all
//! staged values commit at once (tock), so results are independent of
//! traversal order.

pub mod allocator;
pub mod config;
pub mod domain;
pub mod driver;
pub mod report;
pub mod scenario;
pub mod sector;
pub mod society;
pub mod telemetry;

pub use allocator::{AllocationOutcome, ResourceAllocator, SolverOptions};
pub use driver::Simulation;
pub use report::{IterationReport, RunReport, RunSummary};
pub use scenario::Scenario;
pub use society::{NodeKind, SocietyNode, World};
