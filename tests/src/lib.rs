//! Cross-crate tests: the full pipeline against loopback listeners, fake
//! probers and stub enrichers.
#![cfg(test)]

mod scan;
mod support;
