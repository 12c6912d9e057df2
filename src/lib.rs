pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod routes;
pub mod schemas;
pub mod store;
