//! `ish`: a small interactive shell.
//!
//! A line flows through [`lexer`], [`syntax`] and then either
//! [`builtin::dispatch`] or [`pipeline::build`] and [`exec::execute`].
//! [`global::Shell::execute_line`] ties the steps together.

pub mod builtin;
pub mod config;
pub mod error;
pub mod exec;
pub mod global;
pub mod job;
pub mod lexer;
pub mod pipeline;
pub mod redirect;
pub mod signal;
pub mod syntax;

pub use config::Config;
pub use error::ShellError;
pub use global::{Flow, Shell};
