//! Scenario-based tests for mise

mod caching;
mod configured;
mod documents;
mod schema;
mod wiring;
