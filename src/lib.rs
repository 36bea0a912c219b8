pub mod buffer;
pub mod config;
pub mod engine;
pub mod errors;
pub mod index;
pub mod iterators;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod tests;
