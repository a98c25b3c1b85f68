pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod telemetry;
