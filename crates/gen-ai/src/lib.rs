//! Storyreel Generative AI
//!
//! The generative collaborator the rest of the system consumes as a set
//! of opaque async operations:
//! - **Script:** topic -> scene-by-scene narration + visual prompts
//! - **Image:** prompt -> still image, with an explicit fallback model
//! - **Speech:** narration -> playable WAV narration clip
//!
//! All remote calls go through one reusable rate-limit retry policy, and
//! bulk generation runs through one bounded worker pool with a pacing
//! delay, so no call site hand-rolls its own backoff.

pub mod batch;
pub mod gemini;
pub mod provider;
pub mod queue;
pub mod retry;

pub use batch::*;
pub use gemini::*;
pub use provider::*;
pub use queue::*;
pub use retry::*;
