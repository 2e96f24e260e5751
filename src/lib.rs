//! Bridge between an AMBA CHI transaction-level model and an internal
//! message-based coherence protocol, plus a traffic-generator testbench
//! that schedules transactions at simulated ticks and checks the observed
//! responses against ordered expectation/assertion chains.

pub mod clock;
pub mod controller;
pub mod downstream;
pub mod generator;
pub mod message;
pub mod opcode;
pub mod payload;
pub mod phase;
pub mod registry;
pub mod transaction;
pub mod translate;
