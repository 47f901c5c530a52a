pub mod auth;
pub mod chain;
pub mod cleanup;
pub mod config;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod render;
pub mod routes;
pub mod session;
pub mod storage;
pub mod validator;
