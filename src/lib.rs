pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod resources;
pub mod routes;
pub mod session_store;
pub mod shell;
pub mod storage;
pub mod validation;
