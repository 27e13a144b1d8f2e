//! Per-(asset, video) step tracking.
//!
//! [`Pipeline`] is the entity, [`PipelineRepository`] its store, and
//! [`PipelineService`] the only writer.

pub mod entity;
pub mod service;
pub mod store;

pub use entity::{steps, Pipeline, PipelineKey, StepState, StepStatus, StepTransition};
pub use service::PipelineService;
pub use store::{InMemoryPipelineRepository, PipelineRepository};
