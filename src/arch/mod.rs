//! Architecture encoding: super-blocks and the plain-net structure string.

pub mod block;
pub mod encoding;

pub use block::Block;
pub use encoding::Architecture;
