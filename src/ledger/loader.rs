//! Load transactions, recurring definitions and scenarios from CSV

use super::{Frequency, RecurringTransaction, Transaction, TransactionType};
use crate::error::LoadError;
use crate::scenario::{Scenario, ScenarioKind};
use chrono::NaiveDate;
use csv::Reader;
use log::warn;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Raw CSV row for the transactions export
#[derive(Debug, serde::Deserialize)]
struct TransactionRow {
    #[serde(default)]
    user_id: String,
    id: String,
    date: String,
    amount: f64,
    #[serde(rename = "type")]
    transaction_type: String,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    description: String,
}

/// Raw CSV row for the recurring transactions export
#[derive(Debug, serde::Deserialize)]
struct RecurringRow {
    #[serde(default)]
    user_id: String,
    id: String,
    #[serde(default)]
    description: String,
    amount: f64,
    #[serde(rename = "type")]
    transaction_type: String,
    frequency: String,
    next_execution_date: String,
    #[serde(default)]
    is_active: Option<bool>,
}

/// Raw CSV row for a scenario sheet
#[derive(Debug, serde::Deserialize)]
struct ScenarioRow {
    id: String,
    name: String,
    amount: f64,
    date: String,
    kind: String,
    #[serde(default)]
    installment_count: Option<u32>,
}

/// Raw CSV row for a per-user balance snapshot
#[derive(Debug, serde::Deserialize)]
struct BalanceRow {
    user_id: String,
    balance: f64,
}

/// Parse `YYYY-MM-DD`, dropping any time-of-day suffix (`2024-05-01T13:45:00Z`)
pub fn parse_date(value: &str) -> Result<NaiveDate, LoadError> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| LoadError::InvalidDate(value.to_string()))
}

fn parse_type(value: &str) -> Result<TransactionType, LoadError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "income" => Ok(TransactionType::Income),
        "expense" => Ok(TransactionType::Expense),
        other => Err(LoadError::UnknownTransactionType(other.to_string())),
    }
}

impl TransactionRow {
    fn into_transaction(self) -> Result<(String, Transaction), LoadError> {
        let category_id = self.category_id.filter(|c| !c.trim().is_empty());
        let transaction = Transaction {
            id: self.id,
            date: parse_date(&self.date)?,
            amount: self.amount,
            transaction_type: parse_type(&self.transaction_type)?,
            category_id,
            description: self.description,
        };
        Ok((self.user_id, transaction))
    }
}

impl RecurringRow {
    fn into_recurring(self) -> Result<(String, RecurringTransaction), LoadError> {
        let frequency = match Frequency::parse(&self.frequency) {
            Some(f) => f,
            None => {
                warn!(
                    "recurring transaction {} has unknown frequency '{}'",
                    self.id, self.frequency
                );
                return Err(LoadError::UnknownFrequency {
                    id: self.id,
                    value: self.frequency,
                });
            }
        };

        let recurring = RecurringTransaction {
            transaction_type: parse_type(&self.transaction_type)?,
            next_execution_date: parse_date(&self.next_execution_date)?,
            id: self.id,
            description: self.description,
            amount: self.amount,
            frequency,
            is_active: self.is_active.unwrap_or(true),
        };
        Ok((self.user_id, recurring))
    }
}

impl ScenarioRow {
    fn into_scenario(self) -> Result<Scenario, LoadError> {
        let kind = match self.kind.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "one_time" => ScenarioKind::OneTime,
            "installments" => ScenarioKind::Installments {
                count: self.installment_count.unwrap_or(1),
            },
            _ => return Err(LoadError::UnknownScenarioKind(self.kind)),
        };

        Ok(Scenario {
            id: self.id,
            name: self.name,
            amount: self.amount,
            date: parse_date(&self.date)?,
            kind,
        })
    }
}

/// Load transactions grouped by the `user_id` column
pub fn load_user_transactions_from_reader<R: Read>(
    reader: R,
) -> Result<BTreeMap<String, Vec<Transaction>>, LoadError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut by_user: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();

    for result in csv_reader.deserialize() {
        let row: TransactionRow = result?;
        let (user_id, transaction) = row.into_transaction()?;
        by_user.entry(user_id).or_default().push(transaction);
    }

    Ok(by_user)
}

/// Load every transaction in the file, ignoring `user_id`
pub fn load_transactions_from_reader<R: Read>(reader: R) -> Result<Vec<Transaction>, LoadError> {
    Ok(load_user_transactions_from_reader(reader)?
        .into_values()
        .flatten()
        .collect())
}

/// Load every transaction from a CSV file
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Transaction>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_transactions_from_reader(file)
}

/// Load recurring definitions grouped by the `user_id` column
pub fn load_user_recurring_from_reader<R: Read>(
    reader: R,
) -> Result<BTreeMap<String, Vec<RecurringTransaction>>, LoadError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut by_user: BTreeMap<String, Vec<RecurringTransaction>> = BTreeMap::new();

    for result in csv_reader.deserialize() {
        let row: RecurringRow = result?;
        let (user_id, recurring) = row.into_recurring()?;
        by_user.entry(user_id).or_default().push(recurring);
    }

    Ok(by_user)
}

/// Load every recurring definition in the file, ignoring `user_id`
pub fn load_recurring_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<RecurringTransaction>, LoadError> {
    Ok(load_user_recurring_from_reader(reader)?
        .into_values()
        .flatten()
        .collect())
}

/// Load every recurring definition from a CSV file
pub fn load_recurring<P: AsRef<Path>>(path: P) -> Result<Vec<RecurringTransaction>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_recurring_from_reader(file)
}

/// Load scenarios from any reader
pub fn load_scenarios_from_reader<R: Read>(reader: R) -> Result<Vec<Scenario>, LoadError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut scenarios = Vec::new();

    for result in csv_reader.deserialize() {
        let row: ScenarioRow = result?;
        scenarios.push(row.into_scenario()?);
    }

    Ok(scenarios)
}

/// Load scenarios from a CSV file
pub fn load_scenarios<P: AsRef<Path>>(path: P) -> Result<Vec<Scenario>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_scenarios_from_reader(file)
}

/// Load current balances keyed by user (`user_id,balance`); later rows win
pub fn load_balances_from_reader<R: Read>(reader: R) -> Result<BTreeMap<String, f64>, LoadError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut balances = BTreeMap::new();

    for result in csv_reader.deserialize() {
        let row: BalanceRow = result?;
        balances.insert(row.user_id, row.balance);
    }

    Ok(balances)
}

/// Load current balances from a CSV file
pub fn load_balances<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, f64>, LoadError> {
    let file = std::fs::File::open(path)?;
    load_balances_from_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_drops_time_of_day() {
        let date = parse_date("2024-05-01T23:59:59Z").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(matches!(parse_date("01/05/2024"), Err(LoadError::InvalidDate(_))));
    }

    #[test]
    fn test_load_transactions_groups_by_user() {
        let csv = "\
user_id,id,date,amount,type,category_id,description
u1,t1,2024-01-02,45.50,expense,groceries,Market
u1,t2,2024-01-03,3000,income,,Salary
u2,t3,2024-01-03,12.00,expense,,Coffee
";
        let by_user = load_user_transactions_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(by_user.len(), 2);

        let u1 = &by_user["u1"];
        assert_eq!(u1.len(), 2);
        assert_eq!(u1[0].category_id.as_deref(), Some("groceries"));
        assert_eq!(u1[1].category_id, None);
        assert_eq!(u1[1].transaction_type, TransactionType::Income);
    }

    #[test]
    fn test_load_recurring_rejects_unknown_frequency() {
        let csv = "\
user_id,id,description,amount,type,frequency,next_execution_date,is_active
u1,r1,Rent,900,expense,biweekly,2024-01-01,true
";
        let err = load_recurring_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::UnknownFrequency { ref value, .. } if value == "biweekly"));
    }

    #[test]
    fn test_load_recurring_defaults_to_active() {
        let csv = "\
user_id,id,description,amount,type,frequency,next_execution_date,is_active
u1,r1,Salary,3000,income,monthly,2024-01-05,
u1,r2,Gym,40,expense,monthly,2024-01-10,false
";
        let recurring = load_recurring_from_reader(csv.as_bytes()).unwrap();
        assert!(recurring[0].is_active);
        assert!(!recurring[1].is_active);
        assert_eq!(recurring[0].frequency, Frequency::Monthly);
    }

    #[test]
    fn test_load_scenarios() {
        let csv = "\
id,name,amount,date,kind,installment_count
s1,Laptop,2400,2024-02-01,installments,3
s2,Trip,800,2024-03-15,one-time,
";
        let scenarios = load_scenarios_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(scenarios[0].kind, ScenarioKind::Installments { count: 3 });
        assert_eq!(scenarios[1].kind, ScenarioKind::OneTime);
    }

    #[test]
    fn test_load_balances_last_row_wins() {
        let csv = "user_id,balance\nu1,100.5\nu2,-20\nu1,250\n";
        let balances = load_balances_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances["u1"], 250.0);
        assert_eq!(balances["u2"], -20.0);
    }
}
