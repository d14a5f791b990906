//! Shared text helpers and prompt templates.

pub mod prompts;
pub mod string_utils;
