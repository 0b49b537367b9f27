use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: Uuid,
    pub owner: UserId,
    pub name: String,
    /// Days the habit was completed, sorted ascending, one entry per day.
    pub completions: Vec<NaiveDate>,
    pub created: NaiveDate,
}

impl Habit {
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            completions: Vec::new(),
            created: chrono::Local::now().date_naive(),
        }
    }

    /// Record a completion. Returns false if the day was already logged.
    pub fn log(&mut self, date: NaiveDate) -> bool {
        if self.completions.contains(&date) {
            return false;
        }
        self.completions.push(date);
        self.completions.sort();
        true
    }

    /// Remove a completion. Returns false if the day was never logged.
    pub fn unlog(&mut self, date: NaiveDate) -> bool {
        let before = self.completions.len();
        self.completions.retain(|d| *d != date);
        self.completions.len() != before
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        !self.completions.contains(&today)
    }

    /// Consecutive days completed, counted back from today. Today itself may
    /// still be incomplete without breaking the run.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        if self.completions.is_empty() {
            return 0;
        }

        let mut dates = self.completions.clone();
        dates.sort();
        dates.dedup();

        let mut streak = 0u32;
        let mut check_date = today;
        if !dates.contains(&today) {
            check_date = today.pred_opt().unwrap_or(today);
        }

        for date in dates.iter().rev() {
            if *date == check_date {
                streak += 1;
                check_date = check_date.pred_opt().unwrap_or(check_date);
            } else if *date < check_date {
                break;
            }
        }

        streak
    }

    /// Longest run of consecutive days anywhere in the history.
    pub fn best_streak(&self) -> u32 {
        if self.completions.is_empty() {
            return 0;
        }

        let mut dates = self.completions.clone();
        dates.sort();
        dates.dedup();

        let mut best = 0u32;
        let mut current = 1u32;
        for window in dates.windows(2) {
            let diff = (window[1] - window[0]).num_days();
            if diff == 1 {
                current += 1;
            } else {
                best = best.max(current);
                current = 1;
            }
        }
        best.max(current)
    }
}

/// Creation payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub owner: UserId,
    pub name: String,
}

impl NewHabit {
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}
