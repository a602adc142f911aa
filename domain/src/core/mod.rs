//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] — contract violations (empty task lists, bad config)
//! - [`validation`] — structured configuration issues
//! - [`string`] — UTF-8 safe truncation for previews and log lines
//! - [`serde_duration`] — `Duration` as fractional seconds on the wire

pub mod error;
pub mod serde_duration;
pub mod string;
pub mod validation;
