//! Data layer: tabular sources, the joined candidate table, row-level bounds.
//!
//! Architecture:
//! ```text
//!  index.{parquet,csv}   metadata.{parquet,csv}
//!          │                      │
//!          ▼                      ▼
//!        ┌────────────────────────────┐
//!        │  loader    read + left join │  → RawTable
//!        └────────────────────────────┘
//!                     │
//!                     ▼
//!        ┌────────────────────────────┐
//!        │  index     typed records    │  → CandidateIndex
//!        └────────────────────────────┘
//!                     │
//!                     ▼
//!        ┌────────────────────────────┐
//!        │  filter    row-level bounds │  → surviving indices
//!        └────────────────────────────┘
//! ```

pub mod filter;
pub mod index;
pub mod loader;
pub mod model;
