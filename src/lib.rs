//! Guestpitch — outreach pipeline core for guest-booking prospects.

pub mod access;
pub mod api;
pub mod attribution;
pub mod config;
pub mod conversations;
pub mod error;
pub mod pipeline;
pub mod shows;
pub mod store;
pub mod sync;
pub mod templates;
