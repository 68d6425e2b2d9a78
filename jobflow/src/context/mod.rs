//! Per-run and per-stage execution context.

mod identity;
mod stage;

pub use identity::RunIdentity;
pub use stage::StageContext;
