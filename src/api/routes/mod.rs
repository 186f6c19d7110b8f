//! API Routes
//!
//! Route handlers organized by functionality.

pub mod cache;
pub mod health;
pub mod regions;
pub mod statistics;
