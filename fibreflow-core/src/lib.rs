pub mod analytics;
pub mod config;
pub mod error;
pub mod onemap;
pub mod rag;
pub mod sow;
pub mod stock;

pub use config::FibreConfig;
pub use error::{FibreError, Result};
pub use onemap::{ImportReport, OneMapRecord};
pub use rag::{RagScore, ScoreType};
pub use sow::{DropInput, FibreInput, ImportStep, PoleInput, UpsertOutcome};
