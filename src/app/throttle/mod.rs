//! Bandwidth throttling
//!
//! Speeds are parsed from human-readable strings, shared through
//! [`SpeedLimit`] handles and enforced by [`ThrottledStream`].

pub mod pacer;
pub mod speed;
pub mod stream;

pub use pacer::Pacer;
pub use speed::{Speed, SpeedLimit};
pub use stream::ThrottledStream;
