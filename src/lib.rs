//! # greenroom
//!
//! `greenroom` streams externally generated narration into a live avatar
//! session and replaces the avatar's green screen with a background image.
//!
//! Producers post text (with an optional image and background) over HTTP.
//! The server queues it and pushes it to a single subscriber over
//! server-sent events, one message per poll interval. The subscriber hands
//! each message to the avatar, which speaks it, while a chroma-key compositor
//! swaps the background frame by frame.
//!
//! ## Core Modules
//!
//! - `broker`: the message type, the delivery queue and the streaming notifier.
//! - `transport`: the axum router with the ingestion and streaming endpoints.
//! - `client`: the event-stream subscriber and the producer.
//! - `presenter`: drives an avatar session from delivered messages.
//! - `compositor`: chroma keying, background loading and the frame loop.
//! - `config`: layered configuration (defaults, file, environment).
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod client;
pub mod compositor;
pub mod config;
pub mod presenter;
pub mod transport;
pub mod utils;
