//! CLI command implementations.

pub mod decode;
pub mod inspect;
pub mod publish;
