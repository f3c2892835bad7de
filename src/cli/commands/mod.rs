pub mod config;
pub mod password;
pub mod ping;
pub mod serve;
pub mod token;
