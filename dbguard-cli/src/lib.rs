//! dbguard CLI - Command-line interface for guarded database operations.
//!
//! This crate provides the `dbguard` tool, which wraps an external migration
//! tool with environment locks, confirmation prompts, and migration drift
//! repair.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod project;
