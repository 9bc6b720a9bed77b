//! Manuscript - versioned articles with tag relevance
//!
//! This library provides the core of the Manuscript backend: the article
//! version lifecycle and the engine that scores tags against the published
//! corpus.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
