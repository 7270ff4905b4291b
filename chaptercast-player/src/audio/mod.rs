//! Audio subsystem
//!
//! - [`decode`]: raw PCM to sample buffer
//! - [`backend`]: output graph capability interface
//! - [`output`]: cpal device backend
//! - [`null_output`]: headless clock-driven backend

pub mod backend;
pub mod decode;
pub mod mixer;
pub mod null_output;
pub mod output;
pub mod resampler;
pub mod types;

pub use backend::{AudioBackend, EndCallback, SourceId};
pub use decode::decode_pcm16;
pub use null_output::NullOutput;
pub use output::CpalOutput;
pub use types::SampleBuffer;
