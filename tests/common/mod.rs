//! Helpers shared by the unit and integration tests

#![allow(dead_code)]

pub mod mock_upstream;
