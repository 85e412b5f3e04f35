//! # spoke-sim
//!
//! Runtime side of the bike fleet simulator: the HTTP client for the
//! platform API, the per-bike reporting loop, the scripted trip runner and
//! the server-sent-events command listener, plus the assembly code that
//! builds the whole fleet from bootstrap data and trip scripts.
//!
//! Each bike gets two cooperating tasks on a shared tokio runtime: a
//! reporting loop pushing state at a status-dependent cadence, and a
//! command listener reacting to server instructions. A single-permit
//! signal per bike keeps the reporting loop quiet while a scripted trip is
//! being replayed.

pub mod api;
pub mod assembler;
pub mod command;
pub mod config;
pub mod listener;
pub mod routes;
pub mod runner;
pub mod simulator;
pub mod sse;
