use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::debug;

/// Hours between forecast cycles issued each day (00/06/12/18 UTC).
pub const CYCLE_INTERVAL_HOURS: u32 = 6;
/// Hours of one cycle's run that are used before stitching in the next one.
pub const CYCLE_SPAN_HOURS: u32 = 48;

/// A model run identified by its issue date and hour.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForecastCycle {
    pub date: NaiveDate,
    pub hour: u32,
}

impl ForecastCycle {
    /// Latest cycle issued at or before `t`, and the hours elapsed since it.
    pub fn at_or_before(t: NaiveDateTime) -> (ForecastCycle, u32) {
        let hour = t.hour();
        let cycle_hour = hour - hour % CYCLE_INTERVAL_HOURS;
        (ForecastCycle { date: t.date(), hour: cycle_hour }, hour - cycle_hour)
    }

    /// Two-digit label used in archive paths ("00", "06", "12", "18").
    pub fn label(&self) -> String {
        format!("{:02}", self.hour)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN) + Duration::hours(self.hour as i64)
    }

    fn shifted(&self, hours: i64) -> ForecastCycle {
        let t = self.start() + Duration::hours(hours);
        ForecastCycle { date: t.date(), hour: t.hour() }
    }
}

/// Where the wind for one hour of the horizon is read from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// 1-based position of the hour within the horizon.
    pub hour_index: u32,
    pub cycle: ForecastCycle,
    /// Forecast hour within `cycle`.
    pub offset: u32,
    pub valid_time: NaiveDateTime,
}

/// The resolved hour-by-hour timeline of a run.
#[derive(Clone, Debug)]
pub struct ForecastSchedule {
    pub window_start: NaiveDateTime,
    pub first_cycle: ForecastCycle,
    /// Hours between `first_cycle` and `window_start`.
    pub difference: u32,
    pub backwards: bool,
    entries: Vec<ScheduleEntry>,
}

impl ForecastSchedule {
    /// Resolves `nforecast` hours starting at `start`, or ending at `start` when walking backwards.
    ///
    /// Hours past the first 48 are read from later cycles issued 48 h apart,
    /// with their offsets shifted back by the hours already covered.
    pub fn resolve(start: NaiveDateTime, nforecast: u32, backwards: bool) -> Self {
        let window_start = if backwards {
            start - Duration::hours(nforecast as i64)
        } else {
            start
        };
        let (first_cycle, difference) = ForecastCycle::at_or_before(window_start);

        let mut entries: Vec<ScheduleEntry> = (1..=nforecast)
            .map(|hour_index| {
                let stitch = (hour_index - 1) / CYCLE_SPAN_HOURS;
                let covered = stitch * CYCLE_SPAN_HOURS;
                ScheduleEntry {
                    hour_index,
                    cycle: first_cycle.shifted(covered as i64),
                    offset: difference + hour_index - covered,
                    valid_time: window_start + Duration::hours(hour_index as i64),
                }
            })
            .collect();
        if backwards {
            entries.reverse();
        }

        debug!(
            "Resolved {} forecast hours from cycle {} {}z (+{} h){}",
            nforecast,
            first_cycle.date,
            first_cycle.label(),
            difference,
            if backwards { ", backwards" } else { "" }
        );

        Self { window_start, first_cycle, difference, backwards, entries }
    }

    /// Entries in processing order (descending hour index when backwards).
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The analysis hour of the window, used when only the grid geometry is needed.
    pub fn reference_entry(&self) -> ScheduleEntry {
        ScheduleEntry {
            hour_index: 0,
            cycle: self.first_cycle,
            offset: self.difference,
            valid_time: self.window_start,
        }
    }
}
