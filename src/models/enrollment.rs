use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub progress: i64,
    pub created_at: i64,
}
