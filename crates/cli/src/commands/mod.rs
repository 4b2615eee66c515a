//! CLI Commands

pub mod cleanup;
pub mod run;
pub mod scenarios;
pub mod ssh;
