//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod fake_transport;
pub mod mock_server;
