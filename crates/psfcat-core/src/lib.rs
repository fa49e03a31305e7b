pub mod blacklist;
pub mod catalog;
pub mod consts;
pub mod crossmatch;
pub mod diagnostics;
pub mod error;
pub mod flags;
pub mod mask;
pub mod pipeline;
pub mod stats;
pub mod tapebump;
