pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod middleware;
pub mod org;
pub mod query;
pub mod scope;
pub mod services;
