//! Top drugs analytics.
//!
//! Raw query parameters are turned into a [`TopDrugsQuery`] (validated limit,
//! resolved date range, patient scope) which the store then aggregates.

use chrono::{Local, Months, NaiveDate};
use std::sync::Arc;

use crate::context::Actor;
use crate::database::Store;
use crate::error::ApiError;
use crate::models::{Role, TopDrugRow, TopDrugsParams};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Months covered when `from` is not given
pub const DEFAULT_WINDOW_MONTHS: u32 = 6;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A scoped, bounded top drugs query. Both date bounds are inclusive.
///
/// `from > to` is allowed and simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopDrugsQuery {
    /// Restrict to one patient's prescriptions, `None` for all patients
    pub patient_id: Option<i32>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub limit: i64,
}

impl TopDrugsQuery {
    /// Build the query for `actor` from raw parameters.
    ///
    /// Missing bounds default relative to `today`: the range ends today and
    /// starts six calendar months earlier.
    pub fn scoped(
        actor: &Actor,
        params: &TopDrugsParams,
        today: NaiveDate,
    ) -> Result<Self, ApiError> {
        let limit = parse_limit(non_empty(&params.limit))?;

        let from = match non_empty(&params.from) {
            Some(s) => parse_date(s, "from")?,
            None => six_months_before(today),
        };
        let to = match non_empty(&params.to) {
            Some(s) => parse_date(s, "to")?,
            None => today,
        };

        // Physicians see the same unrestricted view as admins
        let patient_id = match actor.role() {
            Role::Patient => Some(actor.numeric_identity("patient")?),
            Role::Physician | Role::Admin => None,
        };

        Ok(Self {
            patient_id,
            from,
            to,
            limit,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn parse_limit(raw: Option<&str>) -> Result<i64, ApiError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIMIT);
    };

    match raw.parse::<i64>() {
        Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::invalid_argument(format!(
            "invalid limit parameter, must be between 1 and {}",
            MAX_LIMIT
        ))),
    }
}

/// Strict `YYYY-MM-DD`: chrono alone also takes `2024-1-5`, `+2024-10-01`
/// and leading whitespace.
fn parse_date(raw: &str, bound: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == raw)
        .ok_or_else(|| {
            ApiError::invalid_argument(format!("invalid {} date format, use YYYY-MM-DD", bound))
        })
}

fn six_months_before(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_months(Months::new(DEFAULT_WINDOW_MONTHS))
        .unwrap_or(NaiveDate::MIN)
}

/// Calendar date on the server clock. Default ranges and new prescriptions
/// both read it so a record created today falls in today's window.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Most prescribed drugs by total quantity within the actor's scope.
    pub async fn top_drugs(
        &self,
        actor: &Actor,
        params: &TopDrugsParams,
        today: NaiveDate,
    ) -> Result<Vec<TopDrugRow>, ApiError> {
        let query = TopDrugsQuery::scoped(actor, params, today)?;

        tracing::debug!(
            role = %actor.role(),
            patient_id = ?query.patient_id,
            from = %query.from,
            to = %query.to,
            limit = query.limit,
            "querying top drugs"
        );

        let rows = self.store.top_drugs(&query).await.map_err(|e| {
            tracing::error!(error = %e, "top drugs query failed");
            ApiError::internal("failed to query top drugs")
        })?;

        Ok(rows)
    }
}
