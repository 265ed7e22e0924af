//! Property-based tests for budget, classification, and fallback guarantees

mod allocation;
mod classification;
