//! Workflow pipelines orchestrating authorities and stateless services.

pub mod conjure;
pub mod perceive;
pub mod verify;
