pub mod charswap;
pub mod counter;
pub mod files;
pub mod threadpool;
