//! Lavamedia - a headless CMS backend
//!
//! Content with editorial workflow, media assets, SEO metadata, analytics
//! and notifications, served over a JSON REST API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
