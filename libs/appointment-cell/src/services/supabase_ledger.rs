// libs/appointment-cell/src/services/supabase_ledger.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentRow, AppointmentStatus, NewAppointment,
};
use crate::services::ledger::{sort_by_slot, AppointmentLedger, SlotPosition};

const TABLE: &str = "/rest/v1/appointments";

/// Ledger backed by the `appointments` table through PostgREST. Slot
/// uniqueness is enforced by the `appointments_active_slot_key` partial index.
pub struct SupabaseAppointmentLedger {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseAppointmentLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            auth_token: config.backend_token().map(str::to_string),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<AppointmentRow> = self
            .supabase
            .request(Method::GET, path, self.auth_token.as_deref(), None)
            .await?;
        into_appointments(rows)
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Vec<AppointmentRow>, DatabaseError> {
        self.supabase
            .request_with_headers(
                Method::PATCH,
                path,
                self.auth_token.as_deref(),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
    }
}

fn into_appointments(rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter().map(Appointment::try_from).collect()
}

fn sql_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn first_row(rows: Vec<AppointmentRow>) -> Result<Option<Appointment>, AppointmentError> {
    rows.into_iter().next().map(Appointment::try_from).transpose()
}

#[async_trait]
impl AppointmentLedger for SupabaseAppointmentLedger {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        let staff_id = appointment.staff_id.clone();
        let (date, start_time) = (appointment.date, appointment.start_time);
        let row = AppointmentRow::from(&appointment.into_appointment(Uuid::new_v4()));

        let body = serde_json::to_value(&row)
            .map_err(|e| AppointmentError::DataIntegrity(e.to_string()))?;

        debug!("Inserting appointment {} for staff {}", row.id, staff_id);
        let result: Result<Vec<AppointmentRow>, DatabaseError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                self.auth_token.as_deref(),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await;

        match result {
            Ok(rows) => first_row(rows)?.ok_or_else(|| {
                error!("Insert of appointment {} returned no representation", row.id);
                AppointmentError::Dependency("insert returned no row".to_string())
            }),
            Err(DatabaseError::UniqueViolation(detail)) => {
                warn!("Slot {} {} for staff {} already taken: {}", date, start_time, staff_id, detail);
                Err(AppointmentError::SlotConflict {
                    staff_id,
                    date,
                    start_time,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}", TABLE, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_for_staff_on(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?staff_id=eq.{}&appointment_date=eq.{}&order=appointment_time.asc",
            TABLE,
            urlencoding::encode(staff_id),
            date
        );
        self.fetch(&path).await
    }

    async fn list_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?appointment_date=eq.{}&order=appointment_time.asc,staff_id.asc",
            TABLE, date
        );
        let mut appointments = self.fetch(&path).await?;
        sort_by_slot(&mut appointments);
        Ok(appointments)
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?and=(appointment_date.gte.{},appointment_date.lte.{})&order=appointment_date.asc,appointment_time.asc",
            TABLE, from, to
        );
        let mut appointments = self.fetch(&path).await?;
        sort_by_slot(&mut appointments);
        Ok(appointments)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if expected.is_terminal() {
            debug!("Appointment {} is {} and stays that way", id, expected);
            return Ok(None);
        }

        let path = format!("{}?id=eq.{}&status_code=eq.{}", TABLE, id, expected.code());
        let body = json!({
            "status_code": target.code(),
            "updated_at": now.to_rfc3339(),
        });

        debug!("Conditional status update {} {} -> {}", id, expected, target);
        first_row(self.patch(&path, body).await?)
    }

    async fn compare_and_move(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        from: SlotPosition,
        to: SlotPosition,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "{}?id=eq.{}&status_code=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}",
            TABLE,
            id,
            expected.code(),
            from.date,
            sql_time(from.start_time)
        );
        let body = json!({
            "appointment_date": to.date,
            "appointment_time": sql_time(to.start_time),
            "updated_at": now.to_rfc3339(),
        });

        debug!("Conditional move of {} to {} {}", id, to.date, to.start_time);
        match self.patch(&path, body).await {
            Ok(rows) => first_row(rows),
            Err(DatabaseError::UniqueViolation(detail)) => {
                warn!("Reschedule target for {} already taken: {}", id, detail);
                let staff_id = self
                    .get(id)
                    .await
                    .ok()
                    .flatten()
                    .map(|a| a.staff_id)
                    .unwrap_or_default();
                Err(AppointmentError::SlotConflict {
                    staff_id,
                    date: to.date,
                    start_time: to.start_time,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
