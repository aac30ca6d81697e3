use crate::error::{AppError, AppResult};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Validated LIMIT/OFFSET pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    pub fn from_params(limit: Option<i64>, offset: Option<i64>) -> AppResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(0);

        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "Limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if offset < 0 {
            return Err(AppError::validation("Offset must be non-negative"));
        }

        Ok(Self { limit, offset })
    }
}
