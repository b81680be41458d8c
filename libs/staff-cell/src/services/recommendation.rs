// libs/staff-cell/src/services/recommendation.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{RankedStaff, Staff, StaffError, StaffRole};
use crate::services::directory::StaffDirectory;

/// Maps symptom tags to specialization keywords. Matching is case-insensitive
/// substring on the staff specialization.
#[derive(Debug, Clone)]
pub struct SymptomKeywordMap {
    keywords: HashMap<String, Vec<String>>,
}

impl Default for SymptomKeywordMap {
    fn default() -> Self {
        let fever_related = ["infectious", "internal", "general", "family"];
        let mut map = Self { keywords: HashMap::new() };

        for tag in ["fever", "cough", "chills", "flu", "infection"] {
            map.insert(tag, &fever_related);
        }
        for tag in ["rash", "skin", "itching", "acne"] {
            map.insert(tag, &["dermatology"]);
        }
        for tag in ["chest pain", "palpitations", "hypertension"] {
            map.insert(tag, &["cardiology"]);
        }
        for tag in ["child", "infant", "vaccination"] {
            map.insert(tag, &["pediatric"]);
        }

        map
    }
}

impl SymptomKeywordMap {
    pub fn empty() -> Self {
        Self { keywords: HashMap::new() }
    }

    pub fn insert(&mut self, tag: &str, keywords: &[&str]) {
        let entry = self.keywords.entry(normalize(tag)).or_default();
        for keyword in keywords {
            let keyword = normalize(keyword);
            if !entry.contains(&keyword) {
                entry.push(keyword);
            }
        }
    }

    /// Union of keywords for the given tags. Unknown tags contribute nothing.
    pub fn keywords_for(&self, symptom_tags: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for tag in symptom_tags {
            if let Some(keywords) = self.keywords.get(&normalize(tag)) {
                for keyword in keywords {
                    if !out.contains(keyword) {
                        out.push(keyword.clone());
                    }
                }
            }
        }
        out
    }

    pub fn is_relevant(&self, keywords: &[String], staff: &Staff) -> bool {
        let specialization = staff.specialization.to_lowercase();
        keywords.iter().any(|k| specialization.contains(k.as_str()))
    }

    /// Stable partition: recommended staff first, then the rest, each bucket in
    /// input order.
    pub fn rank(&self, symptom_tags: &[String], staff: Vec<Staff>) -> Vec<RankedStaff> {
        let keywords = self.keywords_for(symptom_tags);
        let (recommended, other): (Vec<Staff>, Vec<Staff>) = staff
            .into_iter()
            .partition(|s| self.is_relevant(&keywords, s));

        recommended
            .into_iter()
            .map(|staff| RankedStaff { staff, recommended: true })
            .chain(other.into_iter().map(|staff| RankedStaff { staff, recommended: false }))
            .collect()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Ranks `staff` for the symptom context using the default keyword map.
pub fn rank_staff_for_context(symptom_tags: &[String], staff: Vec<Staff>) -> Vec<Staff> {
    SymptomKeywordMap::default()
        .rank(symptom_tags, staff)
        .into_iter()
        .map(|ranked| ranked.staff)
        .collect()
}

pub struct RecommendationService {
    directory: Arc<dyn StaffDirectory>,
    keyword_map: SymptomKeywordMap,
}

impl RecommendationService {
    pub fn new(directory: Arc<dyn StaffDirectory>) -> Self {
        Self::with_keyword_map(directory, SymptomKeywordMap::default())
    }

    pub fn with_keyword_map(directory: Arc<dyn StaffDirectory>, keyword_map: SymptomKeywordMap) -> Self {
        Self { directory, keyword_map }
    }

    /// Ranks available staff for the context. A directory failure yields an
    /// empty list rather than an error.
    pub async fn recommend(
        &self,
        symptom_tags: &[String],
        role: Option<StaffRole>,
        date: NaiveDate,
    ) -> Vec<RankedStaff> {
        let roles = match role {
            Some(role) => vec![role],
            None => vec![StaffRole::Doctor, StaffRole::Nurse],
        };

        let mut roster = Vec::new();
        for role in roles {
            match self.directory.list_available(role, date).await {
                Ok(mut staff) => roster.append(&mut staff),
                Err(StaffError::DirectoryUnavailable(msg)) => {
                    warn!("Staff directory unavailable, recommendations degraded: {}", msg);
                }
                Err(e) => {
                    warn!("Skipping {} staff in recommendations: {}", role, e);
                }
            }
        }

        debug!("Ranking {} staff for tags {:?}", roster.len(), symptom_tags);
        self.keyword_map.rank(symptom_tags, roster)
    }
}
