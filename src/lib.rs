pub mod dataset;
pub mod derivable;
pub mod err;
pub mod initializer;
pub mod layer;
pub mod metrics;
pub mod network;
pub mod optimizer;

mod utils;
