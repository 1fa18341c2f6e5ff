use crate::shared::recurrence::{Frequency, RecurrenceRule, WeekDaySpec};
use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;

/// Hard cap on the number of instants produced for a rule with neither
/// `COUNT` nor `UNTIL`, and on materialized rows in general.
const MAX_OCCURRENCES: u32 = 999;

/// Unbounded rules are never expanded further than this many years past the
/// clock value the expander was constructed with.
const MAX_YEARS_AHEAD: i32 = 20;

/// Stateful iterator over the occurrence start instants of a recurring
/// event, starting strictly after the series start.
///
/// The series start itself is instance 1 and is not emitted; `COUNT`
/// accounting includes it. Instants listed in `EXDATE` consume their
/// instance index but are not emitted. A malformed or unsatisfiable rule
/// degrades to an empty sequence. Restart by constructing a new expander;
/// the iterator is not shareable across threads mid-iteration.
pub struct RecurrenceExpander {
    rule: RecurrenceRule,
    tz: Tz,
    start_date: NaiveDate,
    time_of_day: NaiveTime,
    cursor: NaiveDate,
    scan_until: NaiveDate,
    generated: u32,
    yielded: u32,
    last: Option<DateTime<Utc>>,
    done: bool,
}

impl RecurrenceExpander {
    pub fn new(start: DateTime<Utc>, rule: &RecurrenceRule, tz: Tz, now: DateTime<Utc>) -> Self {
        let local_start = start.with_timezone(&tz);
        let start_date = local_start.date_naive();
        let time_of_day = local_start.time();

        let hard_horizon = shift_years(now.with_timezone(&tz).date_naive().max(start_date), {
            if rule.is_bounded() {
                // A COUNT-bounded rule may legitimately span far more than
                // 20 years; the wider scan window only guards against
                // patterns that never match.
                100
            } else {
                MAX_YEARS_AHEAD
            }
        });
        let scan_until = match rule.until {
            Some(until) => hard_horizon.min(until.with_timezone(&tz).date_naive()),
            None => hard_horizon,
        };

        Self {
            rule: rule.clone(),
            tz,
            start_date,
            time_of_day,
            cursor: start_date,
            scan_until,
            generated: 0,
            yielded: 0,
            last: None,
            done: !rule.is_valid(start),
        }
    }

    /// Next occurrence start, or `None` when the series is exhausted.
    pub fn next_start(&mut self) -> Option<DateTime<Utc>> {
        if self.done {
            return None;
        }
        loop {
            let next = match self.cursor.succ_opt() {
                Some(d) => d,
                None => {
                    self.done = true;
                    return None;
                }
            };
            self.cursor = next;

            if self.cursor > self.scan_until {
                self.done = true;
                return None;
            }
            if !self.matches(self.cursor) {
                continue;
            }

            // The instant consumes an instance index whether or not an
            // EXDATE later suppresses it.
            self.generated += 1;
            if let Some(count) = self.rule.count {
                if self.generated + 1 > count {
                    self.done = true;
                    return None;
                }
            }

            let instant = match self.localize(self.cursor) {
                Some(instant) => instant,
                None => continue,
            };
            if let Some(until) = self.rule.until {
                if instant > until {
                    self.done = true;
                    return None;
                }
            }
            if self.rule.exdates.contains(&instant) {
                continue;
            }
            if let Some(last) = self.last {
                if instant <= last {
                    // malformed rule produced a non-advancing instant
                    self.done = true;
                    return None;
                }
            }

            self.yielded += 1;
            if self.yielded > MAX_OCCURRENCES {
                self.done = true;
                return None;
            }
            self.last = Some(instant);
            return Some(instant);
        }
    }

    fn matches(&self, date: NaiveDate) -> bool {
        if !self.rule.bymonth.is_empty() && !self.rule.bymonth.contains(&date.month()) {
            return false;
        }

        let interval = self.rule.interval as i64;
        match self.rule.freq {
            Frequency::Daily => {
                let days = date.signed_duration_since(self.start_date).num_days();
                if days % interval != 0 {
                    return false;
                }
                self.rule.byday.is_empty() || self.weekday_listed(date.weekday())
            }
            Frequency::Weekly => {
                let anchor = week_anchor(self.start_date);
                let days = date.signed_duration_since(anchor).num_days();
                if days.div_euclid(7) % interval != 0 {
                    return false;
                }
                if self.rule.byday.is_empty() {
                    date.weekday() == self.start_date.weekday()
                } else {
                    self.weekday_listed(date.weekday())
                }
            }
            Frequency::Monthly => {
                let months = months_between(self.start_date, date);
                if months % interval != 0 {
                    return false;
                }
                if self.rule.byday.is_empty() {
                    date.day() == self.start_date.day()
                } else {
                    self.rule
                        .byday
                        .iter()
                        .any(|spec| matches_monthly_byday(date, spec))
                }
            }
            Frequency::Yearly => {
                let years = (date.year() - self.start_date.year()) as i64;
                if years % interval != 0 {
                    return false;
                }
                let month_ok = if self.rule.bymonth.is_empty() {
                    date.month() == self.start_date.month()
                } else {
                    // bymonth filter already applied above
                    true
                };
                if !month_ok {
                    return false;
                }
                if self.rule.byday.is_empty() {
                    date.day() == self.start_date.day()
                } else {
                    self.rule
                        .byday
                        .iter()
                        .any(|spec| matches_monthly_byday(date, spec))
                }
            }
        }
    }

    fn weekday_listed(&self, weekday: Weekday) -> bool {
        self.rule.byday.iter().any(|spec| spec.weekday() == weekday)
    }

    fn localize(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let naive = date.and_time(self.time_of_day);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            // Fall-back transition: take the earlier of the two mappings.
            LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
            LocalResult::None => {
                // Spring-forward gap: roll the wall clock forward until it
                // exists again.
                for minutes in [30i64, 60, 90, 120] {
                    match self
                        .tz
                        .from_local_datetime(&(naive + Duration::minutes(minutes)))
                    {
                        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                            return Some(dt.with_timezone(&Utc))
                        }
                        LocalResult::None => continue,
                    }
                }
                None
            }
        }
    }
}

impl Iterator for RecurrenceExpander {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_start()
    }
}

/// Monday of the week containing `date`.
fn week_anchor(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month");
    first_of_next.pred_opt().expect("valid last of month").day()
}

fn matches_monthly_byday(date: NaiveDate, spec: &WeekDaySpec) -> bool {
    if date.weekday() != spec.weekday() {
        return false;
    }
    match spec.nth() {
        None => true,
        Some(n) if n > 0 => ((date.day() - 1) / 7 + 1) as i32 == n,
        Some(n) => ((days_in_month(date) - date.day()) / 7 + 1) as i32 == -n,
    }
}

fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() + years, date.month(), date.day().min(28))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono_tz::{America::New_York, UTC};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_count_emits_remaining_instances() {
        let start = utc(2024, 1, 1, 9, 0);
        let rule = RecurrenceRule {
            count: Some(10),
            ..Default::default()
        };
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        // instance 1 is the series start; 9 more follow
        assert_eq!(starts.len(), 9);
        assert_eq!(starts[0], utc(2024, 1, 2, 9, 0));
        assert_eq!(starts[8], utc(2024, 1, 10, 9, 0));
    }

    #[test]
    fn weekly_exdate_skips_exactly_that_instant() {
        let start = utc(2024, 1, 1, 9, 0); // a Monday
        let rule = RecurrenceRule {
            freq: Frequency::Weekly,
            exdates: vec![utc(2024, 1, 15, 9, 0)], // 3rd occurrence of the series
            ..Default::default()
        };
        let mut exp = RecurrenceExpander::new(start, &rule, UTC, start);
        assert_eq!(exp.next_start(), Some(utc(2024, 1, 8, 9, 0)));
        assert_eq!(exp.next_start(), Some(utc(2024, 1, 22, 9, 0)));
        assert_eq!(exp.next_start(), Some(utc(2024, 1, 29, 9, 0)));
    }

    #[test]
    fn unbounded_daily_rule_is_capped() {
        let start = utc(2024, 1, 1, 9, 0);
        let rule = RecurrenceRule::default();
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        assert_eq!(starts.len() as u32, MAX_OCCURRENCES);
    }

    #[test]
    fn unbounded_yearly_rule_stops_at_horizon() {
        let start = utc(2024, 3, 15, 12, 0);
        let rule = RecurrenceRule {
            freq: Frequency::Yearly,
            ..Default::default()
        };
        let now = start;
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, now).collect();
        assert!(!starts.is_empty());
        assert!(starts.len() <= MAX_YEARS_AHEAD as usize);
        let limit = utc(2024 + MAX_YEARS_AHEAD, 3, 15, 12, 0);
        assert!(starts.iter().all(|s| *s <= limit));
    }

    #[test]
    fn monthly_second_tuesday() {
        let start = utc(2024, 1, 9, 9, 0); // 2nd Tuesday of January 2024
        let rule = RecurrenceRule {
            freq: Frequency::Monthly,
            count: Some(3),
            byday: vec![WeekDaySpec::new_nth(Weekday::Tue, 2).unwrap()],
            ..Default::default()
        };
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        assert_eq!(starts, vec![utc(2024, 2, 13, 9, 0), utc(2024, 3, 12, 9, 0)]);
    }

    #[test]
    fn monthly_last_friday() {
        let start = utc(2024, 1, 26, 18, 0); // last Friday of January 2024
        let rule = RecurrenceRule {
            freq: Frequency::Monthly,
            count: Some(3),
            byday: vec![WeekDaySpec::new_nth(Weekday::Fri, -1).unwrap()],
            ..Default::default()
        };
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        assert_eq!(
            starts,
            vec![utc(2024, 2, 23, 18, 0), utc(2024, 3, 29, 18, 0)]
        );
    }

    #[test]
    fn bymonth_restricts_daily_rule() {
        let start = utc(2024, 1, 30, 8, 0);
        let rule = RecurrenceRule {
            count: Some(5),
            bymonth: vec![1, 3],
            ..Default::default()
        };
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        // February produces no instances; COUNT=5 covers the series start
        // plus the next four matching days.
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 31, 8, 0),
                utc(2024, 3, 1, 8, 0),
                utc(2024, 3, 2, 8, 0),
                utc(2024, 3, 3, 8, 0),
            ]
        );
    }

    #[test]
    fn invalid_rule_yields_empty_sequence() {
        let start = utc(2024, 1, 1, 9, 0);
        let rule = RecurrenceRule {
            until: Some(start - Duration::days(1)),
            ..Default::default()
        };
        let mut exp = RecurrenceExpander::new(start, &rule, UTC, start);
        assert_eq!(exp.next_start(), None);
    }

    #[test]
    fn until_bound_is_inclusive() {
        let start = utc(2024, 1, 1, 9, 0);
        let rule = RecurrenceRule {
            until: Some(utc(2024, 1, 3, 9, 0)),
            ..Default::default()
        };
        let starts: Vec<_> = RecurrenceExpander::new(start, &rule, UTC, start).collect();
        assert_eq!(starts, vec![utc(2024, 1, 2, 9, 0), utc(2024, 1, 3, 9, 0)]);
    }

    #[test]
    fn daily_rule_keeps_wall_clock_across_dst() {
        // 2024-03-10 is the US spring-forward date
        let start = New_York
            .with_ymd_and_hms(2024, 3, 8, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let rule = RecurrenceRule {
            count: Some(5),
            ..Default::default()
        };
        let starts: Vec<_> =
            RecurrenceExpander::new(start, &rule, New_York, start).collect();
        assert_eq!(starts.len(), 4);
        for s in starts {
            assert_eq!(s.with_timezone(&New_York).time().to_string(), "09:00:00");
        }
    }
}
