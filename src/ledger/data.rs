//! Ledger records read by the engine: posted transactions and recurring definitions

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// Sign applied to an amount when it moves the balance
    pub fn sign(&self) -> f64 {
        match self {
            TransactionType::Income => 1.0,
            TransactionType::Expense => -1.0,
        }
    }
}

/// Recurrence rule of a recurring transaction
///
/// Closed set: anything else is rejected when the record is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Parse the lowercase storage representation
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// A posted transaction owned by the transaction store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store identifier
    pub id: String,

    /// Posting date (time of day is never considered)
    pub date: NaiveDate,

    /// Positive amount; direction comes from `transaction_type`
    pub amount: f64,

    /// Income or expense
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Category, `None` when uncategorized
    #[serde(default)]
    pub category_id: Option<String>,

    /// Free-text description shown in anomaly messages
    #[serde(default)]
    pub description: String,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        amount: f64,
        transaction_type: TransactionType,
        category_id: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            amount,
            transaction_type,
            category_id: category_id.map(str::to_string),
            description: String::new(),
        }
    }

    /// Builder-style description setter
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }
}

/// A recurring transaction definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    /// Store identifier
    pub id: String,

    /// Label, e.g. "Salary" or "Rent"
    #[serde(default)]
    pub description: String,

    /// Positive amount applied each time the rule fires
    pub amount: f64,

    /// Income or expense
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// Recurrence rule
    pub frequency: Frequency,

    /// Anchor date the recurrence pattern is computed from.
    /// Advanced by the scheduler after real execution, never by the engine.
    pub next_execution_date: NaiveDate,

    /// Inactive definitions never fire
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl RecurringTransaction {
    pub fn new(
        id: impl Into<String>,
        amount: f64,
        transaction_type: TransactionType,
        frequency: Frequency,
        next_execution_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            amount,
            transaction_type,
            frequency,
            next_execution_date,
            is_active: true,
        }
    }

    /// Builder-style description setter
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Signed effect on the balance each time the rule fires
    pub fn signed_amount(&self) -> f64 {
        self.transaction_type.sign() * self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parse() {
        assert_eq!(Frequency::parse("Monthly"), Some(Frequency::Monthly));
        assert_eq!(Frequency::parse(" weekly "), Some(Frequency::Weekly));
        assert_eq!(Frequency::parse("fortnightly"), None);
    }

    #[test]
    fn test_storage_names_match_serde() {
        for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly, Frequency::Yearly] {
            assert_eq!(Frequency::parse(frequency.as_str()), Some(frequency));
            assert_eq!(serde_json::to_string(&frequency).unwrap(), format!("\"{}\"", frequency.as_str()));
        }
        assert_eq!(TransactionType::Income.as_str(), "income");
        assert_eq!(
            serde_json::to_string(&TransactionType::Expense).unwrap(),
            format!("\"{}\"", TransactionType::Expense.as_str())
        );
    }

    #[test]
    fn test_signed_amount() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rent = RecurringTransaction::new("r1", 900.0, TransactionType::Expense, Frequency::Monthly, date);
        let salary = RecurringTransaction::new("r2", 3000.0, TransactionType::Income, Frequency::Monthly, date);
        assert_eq!(rent.signed_amount(), -900.0);
        assert_eq!(salary.signed_amount(), 3000.0);
    }

    #[test]
    fn test_recurring_json_uses_storage_names() {
        let json = r#"{
            "id": "r1",
            "amount": 120.0,
            "type": "expense",
            "frequency": "weekly",
            "next_execution_date": "2024-03-04"
        }"#;
        let recurring: RecurringTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(recurring.frequency, Frequency::Weekly);
        assert!(recurring.is_active);

        let bad = json.replace("weekly", "hourly");
        assert!(serde_json::from_str::<RecurringTransaction>(&bad).is_err());
    }
}
