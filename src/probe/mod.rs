//! Media file inspection and validation module

pub mod inspector;
pub mod validator;

pub use inspector::MediaProber;
pub use validator::MediaValidator;
