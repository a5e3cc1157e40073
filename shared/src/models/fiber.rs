//! Fiber models: reusable spools allocated exclusively to one sale

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Availability of a fiber
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiberStatus {
    Free,
    Used,
}

impl FiberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiberStatus::Free => "FREE",
            FiberStatus::Used => "USED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FREE" => Some(FiberStatus::Free),
            "USED" => Some(FiberStatus::Used),
            _ => None,
        }
    }
}

impl std::fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fiber {
    pub id: Uuid,
    pub name: String,
    pub status: FiberStatus,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fiber {
    pub fn is_available(&self) -> bool {
        !self.is_deleted && self.status == FiberStatus::Free
    }
}

/// One allocation of a fiber to a sale (join row)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleFiber {
    pub sale_id: Uuid,
    pub fiber_id: Uuid,
    pub allocated_at: DateTime<Utc>,
    /// Set when the fiber goes back to FREE
    pub released_at: Option<DateTime<Utc>>,
}
