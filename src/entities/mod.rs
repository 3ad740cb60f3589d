//! Entities module - core media types
//!
//! Frame buffers, the chroma keyer, and the FFmpeg decode layer.

pub mod frame;
pub mod keyer;
pub mod loader_video;

pub use frame::Frame;
pub use keyer::ColorKeyRange;
pub use loader_video::VideoMetadata;
