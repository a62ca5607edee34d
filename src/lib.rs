//! # fanout-gateway
//!
//! Horizontally scalable WebSocket broadcast gateway.
//!
//! Any number of gateway instances run side by side. Each holds its own
//! set of client connections, and every message a client sends is delivered
//! to every client on every instance. Instances never talk to each other
//! directly: they share one pub/sub topic (Redis in production).
//!
//! ## Architecture
//!
//! ```text
//! Client ──► WS read loop (ws/) ──► DistributionBus::publish (bus/)
//!                                            │
//!                                   Redis pub/sub topic
//!                                            │
//!            every instance's Supervisor (service/) ◄─┘
//!                          │
//!            ConnectionRegistry::broadcast (domain/)
//!                          │
//!            per-connection queue ──► WS write loop ──► Client
//! ```
//!
//! A client's message is never broadcast locally by the handler that read
//! it; it comes back through the instance's own subscription, so local and
//! remote traffic share one path.

pub mod api;
pub mod app_state;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
