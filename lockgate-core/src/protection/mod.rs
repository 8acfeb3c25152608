mod gate;
mod registry;
mod tracker;

pub use gate::{DenialReason, EnforcementGate, LoginDecision, LoginRequest, GATE_ACTOR};
pub use registry::{BlockListFilter, BlockRegistry};
pub use tracker::AttemptTracker;
