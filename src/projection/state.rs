//! Running state carried from one projected day to the next

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Position and balance of a forecast walk
#[derive(Debug, Clone)]
pub struct ForecastState {
    /// Days since the start of the run (0 = today)
    pub day_index: u32,

    /// Calendar date of `day_index`
    pub date: NaiveDate,

    /// Balance after every flow applied so far
    pub balance: f64,

    /// Today's recurring income
    pub daily_income: f64,

    /// Today's recurring expenses plus baseline
    pub daily_expenses: f64,

    /// Today's recurring net (income minus expenses, recurring entries only)
    pub recurring_net: f64,
}

impl ForecastState {
    /// State positioned on day 0 with the caller's balance
    pub fn start(today: NaiveDate, start_balance: f64) -> Self {
        Self {
            day_index: 0,
            date: today,
            balance: start_balance,
            daily_income: 0.0,
            daily_expenses: 0.0,
            recurring_net: 0.0,
        }
    }

    /// Move to the next calendar day and reset the daily accumulators.
    /// The balance carries over.
    pub fn advance_day(&mut self) {
        self.day_index += 1;
        self.date = self.date + Duration::days(1);
        self.reset_daily();
    }

    fn reset_daily(&mut self) {
        self.daily_income = 0.0;
        self.daily_expenses = 0.0;
        self.recurring_net = 0.0;
    }

    pub fn apply_income(&mut self, amount: f64) {
        self.daily_income += amount;
        self.balance += amount;
    }

    pub fn apply_expense(&mut self, amount: f64) {
        self.daily_expenses += amount;
        self.balance -= amount;
    }

    /// Monday through Friday
    pub fn is_weekday(&self) -> bool {
        !matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
