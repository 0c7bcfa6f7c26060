pub mod actions;
pub mod app;
pub mod authz;
pub mod db;
pub mod departments;
pub mod errors;
pub mod habbo;
pub mod jwt;
pub mod models;
pub mod routes;
pub mod utils;

pub use app::{create_app, create_app_with_resolver};
