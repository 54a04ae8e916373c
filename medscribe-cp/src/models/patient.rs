//! Minimal patient model
//!
//! Patient CRUD lives in another service; this service only needs enough
//! of the row for ownership checks and adapter context (name, age).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
}

impl Patient {
    /// Age in whole years at `now`, if the birth date is known
    pub fn age_years(&self, now: DateTime<Utc>) -> Option<u32> {
        let birth = self.birth_date?;
        let today = now.date_naive();
        let mut age = today.years_since(birth)?;
        // years_since already accounts for month/day, but guard against
        // a birth date in the future
        if birth > today {
            age = 0;
        }
        Some(age)
    }
}
