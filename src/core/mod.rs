pub mod bam;
pub mod engine;
pub mod error;
pub mod io;
pub mod metrics;
pub mod model;
pub mod sam;
