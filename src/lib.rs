pub mod app;
pub mod config;
pub mod discover;
pub mod fetch;
pub mod genres;
pub mod models;
pub mod pipeline;
pub mod project;
pub mod query;
pub mod tmdb;
