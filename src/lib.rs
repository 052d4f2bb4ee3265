//! Client-side store, mutation reconciler and derived views for a
//! project/task tracker, with a SQLite backend and a CLI front end.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod reconciler;
pub mod store;
pub mod views;
