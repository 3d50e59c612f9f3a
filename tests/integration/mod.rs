// Integration tests for mailbridge
// This module organizes all integration tests

pub mod common;
pub mod gateway_http;
pub mod multi_account_sync;
pub mod sync_end_to_end;
