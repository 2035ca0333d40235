//! The synthesis pipeline boundary.
//!
//! The numerical work happens behind the [`Pipeline`] trait. This crate
//! decides which pipeline a task needs ([`PipelineSpec`]), keeps at most one
//! of them alive ([`PipelineCache`]), turns intermediate latents into rough
//! previews ([`ApproximateDecoder`]) and talks to the out-of-process
//! synthesis service ([`ServicePipelineFactory`]).

pub mod bridge;
pub mod cache;
pub mod decoder;
pub mod error;
pub mod pipeline;
pub mod spec;

pub use bridge::{probe_device, ServicePipelineFactory};
pub use cache::{CacheOutcome, LoadedPipeline, PipelineCache};
pub use decoder::ApproximateDecoder;
pub use error::PipelineError;
pub use pipeline::{Latent, Pipeline, PipelineDescriptor, PipelineFactory, StepState, SynthesisRequest};
pub use spec::{MemoryPolicy, ModelRef, ModelSelection, PipelineSpec, PipelineVariant};
