//! vremko — a weather and message-board chat bot.
//!
//! Answers free-text commands by scraping the national weather
//! service, serves a cached animated radar image, looks up dictionary
//! definitions, and relays anonymously submitted web-form text into
//! the chat. Remote products are shielded by a time-windowed,
//! retry-protected cache; the web form hands messages to the chat side
//! through a single-consumer relay.

pub mod bot;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod html;
pub mod relay;
pub mod report;
pub mod utils;
pub mod web;
