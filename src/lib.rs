//! Pull request dashboard for a single GitHub repository.
//!
//! Data flows one way: [`session::PrSession`] fills an in-memory collection
//! from the GitHub API (or the on-disk [`cache::PrCache`]), [`filter`]
//! narrows it, and [`render`] turns the result into rows that the terminal
//! dashboard or the `list` subcommand display.

pub mod cache;
pub mod clone;
pub mod config;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod gh;
pub mod render;
pub mod session;
pub mod token;
pub mod tui;
