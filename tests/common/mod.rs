#![allow(dead_code)]

pub mod fake_fetcher;
pub mod fixtures;
pub mod wiremock_helpers;
