pub mod download;
pub mod job;
pub mod transfer;
