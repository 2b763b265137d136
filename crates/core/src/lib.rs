// Core types and graph algorithms for the Stratus workflow engine

pub mod dag;
pub mod error;
pub mod placeholder;
pub mod resource;
pub mod types;

pub use error::DagError;
pub use types::*;
