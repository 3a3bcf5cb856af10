//! `taskforge serve`: start the management HTTP surface in-process.

pub use taskforge_api::serve;
