//! Integration tests for the plugin scheduler and plugin settings

mod common;
mod postgres_tests;
mod scheduler_tests;
mod settings_tests;
