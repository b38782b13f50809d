//! Route handlers organized by resource

pub mod analytics;
pub mod boqs;
pub mod cable_drums;
pub mod clients;
pub mod contractors;
pub mod health;
pub mod onemap;
pub mod projects;
pub mod rag;
pub mod reports;
pub mod rfqs;
pub mod search;
pub mod sow;
pub mod staff;
pub mod stock;
pub mod suppliers;
