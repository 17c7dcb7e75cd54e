//! Gap-free hourly grid for a reporting period.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::merge::BatchDefaults;
use crate::period::ReportingPeriod;
use crate::timestamp::format_slot;

/// One hourly row of a circuit report.
///
/// Display strings and raw integers are kept side by side: the strings are
/// what gets exported, the integers feed the grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub circuit_code: String,
    pub display_name: String,
    pub timestamp: String,
    pub bandwidth: String,
    pub inbound: String,
    pub outbound: String,
    pub raw_inbound: i64,
    pub raw_outbound: i64,
}

impl GridCell {
    fn empty_slot(slot: NaiveDateTime, defaults: &BatchDefaults) -> Self {
        Self {
            circuit_code: defaults.circuit_code.clone(),
            display_name: defaults.display_name.clone(),
            timestamp: format_slot(slot),
            bandwidth: defaults.bandwidth_label.clone(),
            inbound: "0".to_string(),
            outbound: "0".to_string(),
            raw_inbound: 0,
            raw_outbound: 0,
        }
    }
}

/// Day → hour slot → cell, covering every hour of every day in the period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyGrid {
    days: BTreeMap<NaiveDate, BTreeMap<NaiveDateTime, GridCell>>,
}

impl HourlyGrid {
    /// Builds `days × 24` zero-filled cells seeded with `defaults`.
    #[must_use]
    pub fn build(period: &ReportingPeriod, defaults: &BatchDefaults) -> Self {
        let days = period
            .days()
            .map(|day| {
                let hours = (0..24)
                    .filter_map(|hour| day.and_hms_opt(hour, 0, 0))
                    .map(|slot| (slot, GridCell::empty_slot(slot, defaults)))
                    .collect();
                (day, hours)
            })
            .collect();
        Self { days }
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.days.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn get(&self, slot: NaiveDateTime) -> Option<&GridCell> {
        self.days.get(&slot.date())?.get(&slot)
    }

    pub(crate) fn get_mut(&mut self, slot: NaiveDateTime) -> Option<&mut GridCell> {
        self.days.get_mut(&slot.date())?.get_mut(&slot)
    }

    /// All cells in chronological order.
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.days.values().flat_map(BTreeMap::values)
    }

    /// Cells grouped by day, in chronological order.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, Vec<&GridCell>)> + '_ {
        self.days
            .iter()
            .map(|(day, hours)| (*day, hours.values().collect()))
    }
}
