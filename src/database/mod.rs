pub mod memory;
pub mod migrations;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::analytics::TopDrugsQuery;
use crate::models::{Prescription, PrescriptionRequest, TopDrugRow};

pub use memory::MemoryStore;
pub use migrations::run_migrations;
pub use postgres::Database;

/// Kinds of entity a prescription refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Patient,
    Physician,
    Drug,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Physician => "physicians",
            EntityKind::Drug => "drugs",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Patient => "patient",
            EntityKind::Physician => "physician",
            EntityKind::Drug => "drug",
        };
        f.write_str(name)
    }
}

/// Everything the request handling core needs from persistence.
///
/// Each method is one round trip; nothing here opens a transaction spanning
/// several calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether an entity with this id exists
    async fn exists(&self, kind: EntityKind, id: i32) -> Result<bool>;

    /// Whether the physician is linked to the patient
    async fn physician_treats_patient(&self, physician_id: i32, patient_id: i32) -> Result<bool>;

    /// Insert a validated prescription. The store assigns the id, the
    /// prescribed date (its current date) and both timestamps.
    async fn insert_prescription(&self, request: &PrescriptionRequest) -> Result<Prescription>;

    /// Per-drug totals for prescriptions in the query's scope, ordered by
    /// total quantity descending then drug id ascending, truncated to the limit.
    async fn top_drugs(&self, query: &TopDrugsQuery) -> Result<Vec<TopDrugRow>>;
}
