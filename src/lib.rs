//! Poppins.Bot: a parenting-advice chat service.
//!
//! Chat turns are answered by a hosted model that may call a small set of
//! structured-generation tools; transcripts and saved records are kept in
//! PostgreSQL behind session-authenticated REST routes.

pub mod agent;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod service;
