// Medicine Cabinet - library root, shared by the server binary and tests

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod store;
