pub mod api;
pub mod config;
pub mod gate;
pub mod humanize;
pub mod metadata;
pub mod models;
pub mod observability;
pub mod queue;
pub mod stats;
pub mod storage;
pub mod worker;
