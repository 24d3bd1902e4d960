//! Report rendering for console, JSON, markdown and HTML

pub mod formatter;
pub mod report;
