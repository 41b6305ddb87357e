//! Query functions, one module per table.
//!
//! Every function takes `&mut PgConnection` so callers can run it on a pooled
//! connection or inside an open transaction (`&mut *tx`).

pub mod contexts;
pub mod section_sequences;
pub mod sections;
pub mod sequences;
