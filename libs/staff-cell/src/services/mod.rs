pub mod directory;
pub mod recommendation;

pub use directory::{InMemoryStaffDirectory, StaffDirectory, SupabaseStaffDirectory};
pub use recommendation::{rank_staff_for_context, RecommendationService, SymptomKeywordMap};
