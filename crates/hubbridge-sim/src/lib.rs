//! # hubbridge-sim
//!
//! Drives a [`hubbridge_settlement::Bridge`] the way competing relayers and
//! users would, and checks that the safety invariants survive.
//!
//! - [`relayer`]: pluggable input selection ([`InputSelector`]) and the
//!   [`Relayer`] that drafts proposals
//! - [`harness`]: [`Action`]s, the [`Simulation`] that applies them with an
//!   invariant check after each, and [`run_seeded`]
//! - [`config`]: [`SimConfig`]
//! - [`logging`]: `tracing-subscriber` setup

pub mod config;
pub mod harness;
pub mod logging;
pub mod relayer;

pub use config::SimConfig;
pub use harness::{run_seeded, Action, RunSummary, Simulation, StepOutcome, StepReport};
pub use relayer::{AnchorFirstSelector, InputSelector, RandomSelector, Relayer};
