//! Shared test helpers. Not every test file uses every helper.
#![allow(dead_code)]

pub mod mocks;
