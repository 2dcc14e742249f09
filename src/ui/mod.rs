//! ui
//!
//! Text the bot shows to people.
//!
//! # Modules
//!
//! - [`body`] - PR and issue titles and bodies
//! - [`feedback`] - Replies to bot commands
//!
//! # Design
//!
//! Both modules contain only pure functions: immutable inputs in, formatted
//! strings out. Callers decide where the text is posted.

pub mod body;
pub mod feedback;
