//! Produced segment verification

pub mod verifier;

pub use verifier::SegmentVerifier;
