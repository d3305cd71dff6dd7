//! Session-backed services for admin.

pub mod flash;
