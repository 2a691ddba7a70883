//! Integration tests for the panelforge generation pipeline

mod orchestration;
mod test_utils;
