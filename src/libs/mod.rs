pub mod batch;
pub mod distance;
pub mod error;
pub mod external;
pub mod filter;
pub mod io;
pub mod matrix;
pub mod merge;
pub mod partition;
pub mod phylo;
pub mod pipeline;
pub mod region;
pub mod treebuild;
