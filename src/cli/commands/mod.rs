pub mod book;
pub mod circulation;
pub mod config;
pub mod init;
pub mod recommend;
pub mod status;
pub mod user;
