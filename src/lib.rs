//! Pre-render KaTeX math expressions in static HTML files.
//!
//! [`application::render_math`] rewrites a markup fragment,
//! [`application::parse_html`] rewrites the selected elements of one document
//! and [`application::parse_html_files`] rewrites a batch of files in place.

pub mod application;
pub mod config;
pub mod infra;
