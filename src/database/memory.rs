//! In-process store with the same observable behaviour as the Postgres one.
//!
//! Only the test suites use it; the server binary always runs on Postgres.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{EntityKind, Store};
use crate::analytics::{self, TopDrugsQuery};
use crate::models::{Prescription, PrescriptionRequest, TopDrugRow};

#[derive(Debug, Clone)]
struct DrugRecord {
    name: String,
    generic_name: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    patients: BTreeSet<i32>,
    physicians: BTreeSet<i32>,
    drugs: BTreeMap<i32, DrugRecord>,
    // (physician_id, patient_id)
    links: HashSet<(i32, i32)>,
    prescriptions: Vec<Prescription>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    insert_fails: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store is unavailable");
        }
        Ok(())
    }

    /// Make every subsequent call fail, as a lost connection would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail only `insert_prescription`, leaving the lookups working
    pub fn set_insert_failure(&self, fails: bool) {
        self.insert_fails.store(fails, Ordering::SeqCst);
    }

    pub fn add_patient(&self, id: i32) -> &Self {
        self.state().patients.insert(id);
        self
    }

    pub fn add_physician(&self, id: i32) -> &Self {
        self.state().physicians.insert(id);
        self
    }

    pub fn add_drug(&self, id: i32, name: &str, generic_name: Option<&str>) -> &Self {
        self.state().drugs.insert(
            id,
            DrugRecord {
                name: name.to_string(),
                generic_name: generic_name.map(str::to_string),
            },
        );
        self
    }

    pub fn link(&self, physician_id: i32, patient_id: i32) -> &Self {
        self.state().links.insert((physician_id, patient_id));
        self
    }

    /// Record a historical prescription with an explicit date
    pub fn add_prescription(
        &self,
        patient_id: i32,
        physician_id: i32,
        drug_id: i32,
        quantity: i32,
        prescribed_date: NaiveDate,
    ) -> &Self {
        let mut state = self.state();
        let now = Utc::now();
        let id = next_id(&state);
        state.prescriptions.push(Prescription {
            id,
            patient_id,
            physician_id,
            drug_id,
            quantity,
            instructions: "Test instructions".to_string(),
            prescribed_date,
            created_at: now,
            updated_at: now,
        });
        drop(state);
        self
    }

    pub fn prescriptions(&self) -> Vec<Prescription> {
        self.state().prescriptions.clone()
    }
}

fn next_id(state: &State) -> i32 {
    state.prescriptions.iter().map(|p| p.id).max().unwrap_or(0) + 1
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, kind: EntityKind, id: i32) -> Result<bool> {
        self.check_available()?;
        let state = self.state();
        Ok(match kind {
            EntityKind::Patient => state.patients.contains(&id),
            EntityKind::Physician => state.physicians.contains(&id),
            EntityKind::Drug => state.drugs.contains_key(&id),
        })
    }

    async fn physician_treats_patient(&self, physician_id: i32, patient_id: i32) -> Result<bool> {
        self.check_available()?;
        Ok(self.state().links.contains(&(physician_id, patient_id)))
    }

    async fn insert_prescription(&self, request: &PrescriptionRequest) -> Result<Prescription> {
        self.check_available()?;
        if self.insert_fails.load(Ordering::SeqCst) {
            bail!("prescriptions insert failed");
        }
        let mut state = self.state();

        // Mirrors the foreign keys of the relational schema
        if !state.patients.contains(&request.patient_id)
            || !state.physicians.contains(&request.physician_id)
            || !state.drugs.contains_key(&request.drug_id)
        {
            bail!("foreign key violation on prescriptions insert");
        }

        let now = Utc::now();
        let prescription = Prescription {
            id: next_id(&state),
            patient_id: request.patient_id,
            physician_id: request.physician_id,
            drug_id: request.drug_id,
            quantity: request.quantity,
            instructions: request.instructions.clone(),
            prescribed_date: analytics::today(),
            created_at: now,
            updated_at: now,
        };
        state.prescriptions.push(prescription.clone());

        Ok(prescription)
    }

    async fn top_drugs(&self, query: &TopDrugsQuery) -> Result<Vec<TopDrugRow>> {
        self.check_available()?;
        let state = self.state();

        // drug_id -> (total quantity, count)
        let mut totals: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
        for p in state.prescriptions.iter().filter(|p| {
            p.prescribed_date >= query.from
                && p.prescribed_date <= query.to
                && query.patient_id.map_or(true, |id| p.patient_id == id)
        }) {
            // Inner join: prescriptions of unknown drugs do not count
            if !state.drugs.contains_key(&p.drug_id) {
                continue;
            }
            let entry = totals.entry(p.drug_id).or_insert((0, 0));
            entry.0 += i64::from(p.quantity);
            entry.1 += 1;
        }

        let mut rows: Vec<TopDrugRow> = totals
            .into_iter()
            .filter_map(|(drug_id, (total_quantity, prescription_count))| {
                let drug = state.drugs.get(&drug_id)?;
                Some(TopDrugRow {
                    drug_id,
                    drug_name: drug.name.clone(),
                    generic_name: drug.generic_name.clone().unwrap_or_default(),
                    total_quantity,
                    prescription_count,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            b.total_quantity
                .cmp(&a.total_quantity)
                .then(a.drug_id.cmp(&b.drug_id))
        });
        rows.truncate(usize::try_from(query.limit).unwrap_or(0));

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_today() {
        let store = MemoryStore::new();
        store.add_patient(1).add_physician(1).add_drug(1, "Lipitor", None);

        let request = PrescriptionRequest {
            patient_id: 1,
            physician_id: 1,
            drug_id: 1,
            quantity: 30,
            instructions: "Take one daily".to_string(),
        };
        let first = assert_ok!(store.insert_prescription(&request).await);
        let second = assert_ok!(store.insert_prescription(&request).await);

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.prescribed_date, analytics::today());
        assert_eq!(store.prescriptions().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_dangling_references() {
        let store = MemoryStore::new();
        store.add_patient(1).add_physician(1);

        let request = PrescriptionRequest {
            patient_id: 1,
            physician_id: 1,
            drug_id: 9,
            quantity: 1,
            instructions: "x".to_string(),
        };
        assert_err!(store.insert_prescription(&request).await);
    }

    #[tokio::test]
    async fn test_top_drugs_ties_broken_by_drug_id() {
        let store = MemoryStore::new();
        store
            .add_drug(5, "E", None)
            .add_drug(2, "B", Some("b"))
            .add_prescription(1, 1, 5, 10, date("2024-10-01"))
            .add_prescription(1, 1, 2, 10, date("2024-10-01"));

        let rows = assert_ok!(
            store
                .top_drugs(&TopDrugsQuery {
                    patient_id: None,
                    from: date("2024-10-01"),
                    to: date("2024-10-01"),
                    limit: 10,
                })
                .await
        );

        let ids: Vec<i32> = rows.iter().map(|r| r.drug_id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(rows[1].generic_name, "");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.add_patient(1);
        store.set_unavailable(true);

        assert_err!(store.exists(EntityKind::Patient, 1).await);
        assert_err!(store.physician_treats_patient(1, 1).await);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_lookups_working() {
        let store = MemoryStore::new();
        store.add_patient(1).add_physician(1).add_drug(1, "Lipitor", None);
        store.set_insert_failure(true);

        assert!(assert_ok!(store.exists(EntityKind::Patient, 1).await));
        let request = PrescriptionRequest {
            patient_id: 1,
            physician_id: 1,
            drug_id: 1,
            quantity: 1,
            instructions: "x".to_string(),
        };
        assert_err!(store.insert_prescription(&request).await);
        assert!(store.prescriptions().is_empty());
    }
}
