//! HTTP API: server wiring, routing, and protocol response mapping.

pub mod app;
