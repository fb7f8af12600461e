#![allow(dead_code)]

pub mod fake_dom;
pub mod fixtures;
pub mod wiremock_helpers;
