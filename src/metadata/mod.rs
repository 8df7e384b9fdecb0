//! Metadata Store Adapter (spec §4.3): the `processed_images` table and
//! the operations the Admission Gate and Worker use to read/write it.
//!
//! `PgMetadataStore` is the production adapter (`sqlx` against Postgres,
//! runtime-checked queries since there's no live database to prepare
//! against at build time). `InMemoryMetadataStore` is the test double.

mod error;
mod in_memory;
mod postgres;
mod store;
mod types;

pub use error::MetadataError;
pub use in_memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use store::MetadataStore;
pub use types::{
    AggregateStats, FaceMeta, JobRecord, JobStatus, NewJobRecord, QueryFilters,
    VehicleDetectionData,
};
