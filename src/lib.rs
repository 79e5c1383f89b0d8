pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prefs;
pub mod repo;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;
pub mod sync;
