use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Bearer used by the scheduling backends; falls back to the anon key.
    pub supabase_service_key: String,
    pub server_port: u16,
    pub http_timeout_secs: u64,
    /// JSON roster loaded into the in-memory staff directory when Supabase is
    /// not configured.
    pub staff_seed_file: Option<String>,
    pub scheduling: SchedulingConfig,
}

/// Clinic-wide scheduling policy. The slot grid is global: every staff member
/// shares the same business hours and granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub slot_duration_minutes: u32,
    pub business_hours: Vec<BusinessWindow>,
    pub default_daily_capacity_minutes: u32,
    /// `None` keeps pending appointments forever.
    pub pending_expiry_minutes: Option<u32>,
}

/// Business window. Slots start every slot duration from `start` up to and
/// including `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_DAILY_CAPACITY_MINUTES: u32 = 480;
pub const DEFAULT_BUSINESS_HOURS: &str = "08:00-12:00,14:00-17:00";

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            business_hours: parse_business_hours(DEFAULT_BUSINESS_HOURS)
                .unwrap_or_default(),
            default_daily_capacity_minutes: DEFAULT_DAILY_CAPACITY_MINUTES,
            pending_expiry_minutes: None,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let business_hours = match env::var("BUSINESS_HOURS") {
            Ok(raw) => parse_business_hours(&raw).unwrap_or_else(|| {
                warn!("BUSINESS_HOURS '{}' is malformed, using {}", raw, DEFAULT_BUSINESS_HOURS);
                defaults.business_hours.clone()
            }),
            Err(_) => defaults.business_hours.clone(),
        };

        let slot_duration_minutes = env_number("SLOT_DURATION_MINUTES", defaults.slot_duration_minutes);
        let slot_duration_minutes = if slot_duration_minutes == 0 {
            warn!("SLOT_DURATION_MINUTES must be positive, using default");
            DEFAULT_SLOT_DURATION_MINUTES
        } else {
            slot_duration_minutes
        };

        let pending_expiry_minutes = env::var("PENDING_EXPIRY_MINUTES")
            .ok()
            .and_then(|raw| match raw.parse::<u32>() {
                Ok(0) => None,
                Ok(minutes) => Some(minutes),
                Err(_) => {
                    warn!("PENDING_EXPIRY_MINUTES '{}' is not a number, expiry disabled", raw);
                    None
                }
            });

        Self {
            slot_duration_minutes,
            business_hours,
            default_daily_capacity_minutes: env_number(
                "DEFAULT_DAILY_CAPACITY_MINUTES",
                defaults.default_daily_capacity_minutes,
            ),
            pending_expiry_minutes,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default(),
            server_port: env_number("SERVER_PORT", 3000),
            http_timeout_secs: env_number("HTTP_TIMEOUT_SECS", 10),
            staff_seed_file: env::var("STAFF_SEED_FILE").ok().filter(|path| !path.is_empty()),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn backend_token(&self) -> Option<&str> {
        if !self.supabase_service_key.is_empty() {
            Some(&self.supabase_service_key)
        } else if !self.supabase_anon_key.is_empty() {
            Some(&self.supabase_anon_key)
        } else {
            None
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn env_number<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} '{}' is not valid, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parses `HH:MM-HH:MM[,HH:MM-HH:MM...]`. Windows must be non-empty and
/// strictly ordered without overlap.
pub fn parse_business_hours(raw: &str) -> Option<Vec<BusinessWindow>> {
    let mut windows: Vec<BusinessWindow> = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = part.split_once('-')?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
        if start >= end {
            return None;
        }
        if let Some(previous) = windows.last() {
            if previous.end > start {
                return None;
            }
        }
        windows.push(BusinessWindow { start, end });
    }

    if windows.is_empty() {
        None
    } else {
        Some(windows)
    }
}
