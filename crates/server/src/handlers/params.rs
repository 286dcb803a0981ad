//! Query-string shapes shared by the list and summary endpoints.

use chrono::NaiveDate;
use serde::Deserialize;
use tresor_core::{AccountOrder, DateRange, SortDirection};
use tresor_storage::AccountQuery;

use crate::error::{ApiError, ApiResult};

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD` (both inclusive) or `?month=YYYY-MM`.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub month: Option<String>,
}

impl RangeParams {
    pub fn range(&self) -> ApiResult<Option<DateRange>> {
        if let Some(month) = &self.month {
            if self.start.is_some() || self.end.is_some() {
                return Err(ApiError::BadRequest(
                    "month cannot be combined with start or end".to_string(),
                ));
            }
            return parse_month(month).map(Some);
        }

        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start <= end => Ok(Some(DateRange::new(start, end))),
            (Some(_), Some(_)) => Err(ApiError::BadRequest("start must not be after end".to_string())),
            _ => Err(ApiError::BadRequest(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

fn parse_month(raw: &str) -> ApiResult<DateRange> {
    let invalid = || ApiError::BadRequest(format!("Invalid month '{raw}', expected YYYY-MM"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    DateRange::month(year, month).ok_or_else(invalid)
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountListParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub month: Option<String>,
    pub order_by: Option<AccountOrder>,
    pub transactions_order: Option<SortDirection>,
}

impl AccountListParams {
    pub fn to_query(&self) -> ApiResult<AccountQuery> {
        let range = RangeParams {
            start: self.start,
            end: self.end,
            month: self.month.clone(),
        }
        .range()?;
        Ok(AccountQuery {
            range,
            order_by: self.order_by.unwrap_or_default(),
            transactions_order: self.transactions_order.unwrap_or_default(),
        })
    }
}
