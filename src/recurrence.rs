//! Recurrence expansion: does a recurring transaction fire on a given date?
//!
//! Rules are anchored on `next_execution_date`:
//! - nothing fires before the anchor
//! - daily fires every day from the anchor onward
//! - weekly fires every 7 days from the anchor
//! - monthly fires when the day of month matches the anchor's; months shorter
//!   than the anchor day are skipped, not clamped (a 31st anchor never fires in February)
//! - yearly fires when both day and month match (a Feb 29 anchor only fires in leap years)

use crate::ledger::{Frequency, RecurringTransaction};
use chrono::{Datelike, NaiveDate};

/// Whether `recurring` fires on `target_date`
pub fn fires_on(recurring: &RecurringTransaction, target_date: NaiveDate) -> bool {
    let anchor = recurring.next_execution_date;
    if target_date < anchor {
        return false;
    }

    let days_diff = (target_date - anchor).num_days();

    match recurring.frequency {
        Frequency::Daily => true,
        Frequency::Weekly => days_diff % 7 == 0,
        Frequency::Monthly => target_date.day() == anchor.day(),
        Frequency::Yearly => target_date.day() == anchor.day() && target_date.month() == anchor.month(),
    }
}

/// All dates in `[from, to]` on which `recurring` fires, ascending
pub fn occurrences_between(
    recurring: &RecurringTransaction,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| fires_on(recurring, *d))
        .collect()
}
