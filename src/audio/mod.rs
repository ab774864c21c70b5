//! Audio acquisition and normalization boundary.

pub mod convert;
pub mod download;
pub mod wav;
