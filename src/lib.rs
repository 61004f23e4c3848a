pub mod capture;
pub mod config;
pub mod sink;
pub mod transcode;
