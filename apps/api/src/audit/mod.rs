pub mod scoring;
pub mod synthesize;
