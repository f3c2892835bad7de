pub mod app;
pub mod auth;
pub mod cli;
pub mod clients;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;
