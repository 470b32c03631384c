pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod static_assets;
pub mod time;

#[cfg(test)]
pub mod test_support;
