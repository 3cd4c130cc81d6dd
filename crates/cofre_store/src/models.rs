//! Typed record models — conveniences over the dynamic JSON record form.
//!
//! The engine itself stores JSON objects; these structs give business
//! callers a typed handle that serializes to the exact field names the
//! schema indexes (`companyId`, `dueDate`, ...).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// A boleto (payment slip) belonging to one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boleto {
    pub id: String,
    pub company_id: String,
    pub due_date: NaiveDate,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub company_id: String,
    pub issue_date: NaiveDate,
    pub number: String,
    pub customer: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub company_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Convert a typed model into the dynamic record form the engine stores.
pub fn to_record<T: Serialize>(model: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(model)?)
}

/// Parse a decrypted record back into a typed model.
pub fn from_record<T: for<'de> Deserialize<'de>>(record: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(record)?)
}
