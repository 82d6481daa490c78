//! Recruit Onboard: profile onboarding for a recruitment marketplace.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
