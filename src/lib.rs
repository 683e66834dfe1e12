//! Iron Atlas: multi-tenant coaching backend where coaches assemble
//! diet, training and hormonal protocols for their clients.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
