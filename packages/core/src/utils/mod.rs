//! Utility functions for KnowledgeTree Core
//!
//! This module provides common utility functions used across the codebase.

mod markdown;

pub use markdown::{render_html, strip_markdown};
