// Live-execution layer for the Stratus workflow engine: reconciles desired
// execution-control state onto running pods and ingests externally
// triggered operations with backpressure.

pub mod config;
pub mod error;
pub mod events;
pub mod exec_control;
pub mod pods;
pub mod queue;
pub mod signal;

pub use error::ControllerError;
