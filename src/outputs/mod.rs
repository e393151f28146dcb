//! What happens to the selected articles once a run has picked them.
//!
//! - [`digest`]: renders the chat message
//! - [`webhook`]: delivers it

pub mod digest;
pub mod webhook;
