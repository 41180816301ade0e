pub mod config;
pub mod email;
pub mod logging;
pub mod repositories;
pub mod rest;
