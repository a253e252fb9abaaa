pub mod core;
pub mod db;
pub mod models;
pub mod portal_web_server;
pub mod routes;
