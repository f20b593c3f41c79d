//! API Tests

mod git_e2e_tests;
mod health_tests;
mod preview_tests;
mod publish_tests;
