// libs/staff-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Staff, StaffError, StaffRole};

/// Read-only view over the staff roster.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    /// Available staff of `role`, ordered by display name then id.
    async fn list_available(&self, role: StaffRole, date: NaiveDate) -> Result<Vec<Staff>, StaffError>;

    async fn get_staff(&self, staff_id: &str) -> Result<Staff, StaffError>;

    /// Staff records for the given ids. Unknown ids are skipped.
    async fn get_many(&self, staff_ids: &[String]) -> Result<Vec<Staff>, StaffError>;

    fn default_capacity_minutes(&self) -> u32;

    async fn get_capacity(&self, staff_id: &str, _date: NaiveDate) -> Result<u32, StaffError> {
        let staff = self.get_staff(staff_id).await?;
        Ok(staff
            .daily_capacity_minutes
            .unwrap_or_else(|| self.default_capacity_minutes()))
    }
}

fn sort_roster(staff: &mut [Staff]) {
    staff.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ==============================================================================
// SUPABASE-BACKED DIRECTORY
// ==============================================================================

pub struct SupabaseStaffDirectory {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
    default_capacity_minutes: u32,
}

impl SupabaseStaffDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            auth_token: config.backend_token().map(str::to_string),
            default_capacity_minutes: config.scheduling.default_daily_capacity_minutes,
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Staff>, StaffError> {
        let rows: Vec<Staff> = self
            .supabase
            .request(Method::GET, path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl StaffDirectory for SupabaseStaffDirectory {
    async fn list_available(&self, role: StaffRole, date: NaiveDate) -> Result<Vec<Staff>, StaffError> {
        debug!("Listing available {} staff for {}", role, date);

        let path = format!(
            "/rest/v1/staff?role=eq.{}&is_available=eq.true&order=display_name.asc,id.asc",
            role
        );
        let mut staff = self.fetch(&path).await?;
        // Keep only available staff.
        staff.retain(|s| s.available && s.role == role);
        sort_roster(&mut staff);
        Ok(staff)
    }

    async fn get_staff(&self, staff_id: &str) -> Result<Staff, StaffError> {
        debug!("Fetching staff member: {}", staff_id);

        let path = format!("/rest/v1/staff?id=eq.{}", urlencoding::encode(staff_id));
        self.fetch(&path)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StaffError::NotFound(staff_id.to_string()))
    }

    async fn get_many(&self, staff_ids: &[String]) -> Result<Vec<Staff>, StaffError> {
        if staff_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = staff_ids
            .iter()
            .map(|id| format!("\"{}\"", id.replace('"', "")))
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/staff?id=in.({})", urlencoding::encode(&ids));
        self.fetch(&path).await
    }

    fn default_capacity_minutes(&self) -> u32 {
        self.default_capacity_minutes
    }
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

/// Roster held in process, for local runs and tests.
pub struct InMemoryStaffDirectory {
    staff: RwLock<HashMap<String, Staff>>,
    default_capacity_minutes: u32,
}

impl InMemoryStaffDirectory {
    pub fn new(default_capacity_minutes: u32) -> Self {
        Self {
            staff: RwLock::new(HashMap::new()),
            default_capacity_minutes,
        }
    }

    pub fn with_staff(default_capacity_minutes: u32, roster: Vec<Staff>) -> Self {
        let staff = roster.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            staff: RwLock::new(staff),
            default_capacity_minutes,
        }
    }

    pub async fn upsert(&self, staff: Staff) {
        self.staff.write().await.insert(staff.id.clone(), staff);
    }

    pub async fn set_available(&self, staff_id: &str, available: bool) -> Result<(), StaffError> {
        let mut roster = self.staff.write().await;
        let staff = roster
            .get_mut(staff_id)
            .ok_or_else(|| StaffError::NotFound(staff_id.to_string()))?;
        if staff.available != available {
            warn!("Staff {} availability changed to {}", staff_id, available);
        }
        staff.available = available;
        Ok(())
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn list_available(&self, role: StaffRole, _date: NaiveDate) -> Result<Vec<Staff>, StaffError> {
        let mut staff: Vec<Staff> = self
            .staff
            .read()
            .await
            .values()
            .filter(|s| s.available && s.role == role)
            .cloned()
            .collect();
        sort_roster(&mut staff);
        Ok(staff)
    }

    async fn get_staff(&self, staff_id: &str) -> Result<Staff, StaffError> {
        self.staff
            .read()
            .await
            .get(staff_id)
            .cloned()
            .ok_or_else(|| StaffError::NotFound(staff_id.to_string()))
    }

    async fn get_many(&self, staff_ids: &[String]) -> Result<Vec<Staff>, StaffError> {
        let roster = self.staff.read().await;
        Ok(staff_ids.iter().filter_map(|id| roster.get(id).cloned()).collect())
    }

    fn default_capacity_minutes(&self) -> u32 {
        self.default_capacity_minutes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(id: &str, name: &str, role: StaffRole, available: bool) -> Staff {
        Staff {
            id: id.to_string(),
            display_name: name.to_string(),
            role,
            specialization: "general medicine".to_string(),
            available,
            daily_capacity_minutes: None,
        }
    }

    fn june_10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[tokio::test]
    async fn list_available_filters_role_and_flag_and_sorts() {
        let directory = InMemoryStaffDirectory::with_staff(
            480,
            vec![
                staff("3", "Dr. Zhou", StaffRole::Doctor, true),
                staff("1", "Dr. Adams", StaffRole::Doctor, true),
                staff("2", "Dr. Brown", StaffRole::Doctor, false),
                staff("4", "Nurse Kim", StaffRole::Nurse, true),
            ],
        );

        let doctors = directory.list_available(StaffRole::Doctor, june_10()).await.unwrap();
        let ids: Vec<&str> = doctors.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn capacity_falls_back_to_default() {
        let mut custom = staff("1", "Dr. Adams", StaffRole::Doctor, true);
        custom.daily_capacity_minutes = Some(240);
        let directory = InMemoryStaffDirectory::with_staff(
            480,
            vec![custom, staff("2", "Dr. Brown", StaffRole::Doctor, true)],
        );

        assert_eq!(directory.get_capacity("1", june_10()).await.unwrap(), 240);
        assert_eq!(directory.get_capacity("2", june_10()).await.unwrap(), 480);
        assert!(matches!(
            directory.get_capacity("missing", june_10()).await,
            Err(StaffError::NotFound(_))
        ));
    }
}
