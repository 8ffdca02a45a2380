//! # Nexa Protocols
//!
//! Wire formats and text formats spoken or consumed by the scanner. Nothing in
//! here performs I/O, every function maps bytes or text to values and back.

pub mod banner;
pub mod dns;
pub mod nmap;
pub mod whois;
