pub mod clusterscan;

pub use clusterscan::*;
