//! Prescription authorization and validation.
//!
//! [`PrescriptionService::create`] decides whether an actor may write a
//! prescription and checks it against the store before inserting. Checks run
//! in a fixed order and the first failure wins:
//!
//! 1. patients may never prescribe
//! 2. field validation
//! 3. physicians only: self attribution, then the physician/patient link
//! 4. existence of patient, physician and drug, one lookup each
//!
//! The checks and the insert are separate round trips with no transaction
//! around them, so two concurrent requests can both pass the checks. The
//! schema's foreign keys still reject dangling references at insert time.

use std::sync::Arc;

use crate::context::Actor;
use crate::database::{EntityKind, Store};
use crate::error::ApiError;
use crate::models::{Prescription, PrescriptionRequest, Role};

pub struct PrescriptionService {
    store: Arc<dyn Store>,
}

impl PrescriptionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Authorize, validate and insert a prescription.
    pub async fn create(
        &self,
        actor: &Actor,
        request: PrescriptionRequest,
    ) -> Result<Prescription, ApiError> {
        ensure_may_prescribe(actor)?;
        validate_request(&request)?;

        if actor.role() == Role::Physician {
            self.authorize_physician(actor, &request).await?;
        }

        self.require_exists(EntityKind::Patient, request.patient_id).await?;
        self.require_exists(EntityKind::Physician, request.physician_id).await?;
        self.require_exists(EntityKind::Drug, request.drug_id).await?;

        let prescription = self.store.insert_prescription(&request).await?;

        tracing::info!(
            prescription_id = prescription.id,
            patient_id = prescription.patient_id,
            physician_id = prescription.physician_id,
            drug_id = prescription.drug_id,
            role = %actor.role(),
            "prescription created"
        );

        Ok(prescription)
    }

    async fn authorize_physician(
        &self,
        actor: &Actor,
        request: &PrescriptionRequest,
    ) -> Result<(), ApiError> {
        let physician_id = actor.numeric_identity("physician")?;

        if request.physician_id != physician_id {
            tracing::warn!(
                physician_id,
                requested_physician_id = request.physician_id,
                "physician attempted to prescribe as another physician"
            );
            return Err(ApiError::forbidden(
                "physician can only create prescriptions for themselves",
            ));
        }

        let linked = self
            .store
            .physician_treats_patient(physician_id, request.patient_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "physician-patient relationship check failed");
                ApiError::internal("error checking physician-patient relationship")
            })?;

        if !linked {
            tracing::warn!(
                physician_id,
                patient_id = request.patient_id,
                "physician not authorized for patient"
            );
            return Err(ApiError::forbidden(
                "physician is not authorized to prescribe to this patient",
            ));
        }

        Ok(())
    }

    async fn require_exists(&self, kind: EntityKind, id: i32) -> Result<(), ApiError> {
        if self.store.exists(kind, id).await? {
            Ok(())
        } else {
            Err(ApiError::invalid_argument(format!("{} not found", kind)))
        }
    }
}

/// Role gate that runs before anything else, including body decoding.
pub fn ensure_may_prescribe(actor: &Actor) -> Result<(), ApiError> {
    if actor.role() == Role::Patient {
        tracing::warn!(patient = ?actor.identity(), "patient attempted to create a prescription");
        return Err(ApiError::forbidden("patients cannot create prescriptions"));
    }
    Ok(())
}

/// Field constraints, checked in declaration order.
pub fn validate_request(request: &PrescriptionRequest) -> Result<(), ApiError> {
    let positive = [
        ("patient_id", request.patient_id),
        ("physician_id", request.physician_id),
        ("drug_id", request.drug_id),
        ("quantity", request.quantity),
    ];
    if let Some((field, _)) = positive.iter().find(|(_, value)| *value <= 0) {
        return Err(ApiError::invalid_argument(format!(
            "{} must be positive",
            field
        )));
    }

    if request.instructions.is_empty() {
        return Err(ApiError::invalid_argument(
            "sig (instructions) cannot be empty",
        ));
    }

    Ok(())
}
