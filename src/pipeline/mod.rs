// Event digest pipeline

pub mod processing;

// Re-export key types from the processing stage
pub use processing::dates;
