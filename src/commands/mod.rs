//! Command families written against [`crate::executor::Executor`].

pub mod bloom;

pub use bloom::{Bloom, BloomInfo, BloomInsertOptions, BloomReserveOptions};
