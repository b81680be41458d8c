// libs/appointment-cell/src/services/patients.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::AppointmentError;

/// External patient registry. Only display names are needed here.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Display names keyed by patient id. Unknown ids are absent.
    async fn display_names(
        &self,
        patient_ids: &[String],
    ) -> Result<HashMap<String, String>, AppointmentError>;
}

#[derive(Debug, Deserialize)]
struct PatientNameRow {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl PatientNameRow {
    fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.id.clone()
        } else {
            name
        }
    }
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            auth_token: config.backend_token().map(str::to_string),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn display_names(
        &self,
        patient_ids: &[String],
    ) -> Result<HashMap<String, String>, AppointmentError> {
        if patient_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = patient_ids
            .iter()
            .map(|id| format!("\"{}\"", id.replace('"', "")))
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/patients?select=id,first_name,last_name&id=in.({})",
            urlencoding::encode(&ids)
        );
        debug!("Resolving {} patient names", patient_ids.len());

        let rows: Vec<PatientNameRow> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let name = row.display_name();
                (row.id, name)
            })
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, patient_id: &str, display_name: &str) {
        self.names
            .write()
            .await
            .insert(patient_id.to_string(), display_name.to_string());
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn display_names(
        &self,
        patient_ids: &[String],
    ) -> Result<HashMap<String, String>, AppointmentError> {
        let names = self.names.read().await;
        Ok(patient_ids
            .iter()
            .filter_map(|id| names.get(id).map(|name| (id.clone(), name.clone())))
            .collect())
    }
}
