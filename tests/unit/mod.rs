// Unit tests for mailbridge
// This module organizes all unit tests

pub mod folder_cache;
pub mod gateway_ops;
