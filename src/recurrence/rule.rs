//! Decides on which calendar dates a recurring template fires.

use serde::{Deserialize, Serialize};
use time::{Date, Month, util::is_leap_year};

use crate::{Error, recurrence::Frequency};

/// The recurrence configuration of a template.
///
/// To create a validated rule use [RecurrenceRule::new].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// The period unit.
    pub frequency: Frequency,
    /// Fire every `interval` periods, e.g. 2 with [Frequency::Weekly] is
    /// every other week.
    pub interval: u32,
    /// The day of the month (1-31) for monthly and yearly rules. Days past the
    /// end of a short month fall on that month's last day.
    pub day_of_month: Option<u8>,
    /// The day of the week for weekly rules, 0 is Sunday and 6 is Saturday.
    pub day_of_week: Option<u8>,
    /// The first day the rule may fire. Intervals are counted from here.
    pub start_date: Date,
}

impl RecurrenceRule {
    /// Create a recurrence rule.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidRecurrence] if:
    /// - `frequency` is not a recognised frequency,
    /// - `interval` is zero,
    /// - `day_of_month` is missing for a monthly or yearly rule, set for any
    ///   other rule, or outside 1-31,
    /// - `day_of_week` is missing for a weekly rule, set for any other rule, or
    ///   outside 0-6.
    pub fn new(
        frequency: Frequency,
        interval: u32,
        day_of_month: Option<u8>,
        day_of_week: Option<u8>,
        start_date: Date,
    ) -> Result<Self, Error> {
        let rule = Self::new_unchecked(frequency, interval, day_of_month, day_of_week, start_date);
        rule.validate()?;

        Ok(rule)
    }

    /// Create a recurrence rule without validation.
    ///
    /// The caller should ensure the rule satisfies the constraints documented
    /// on [RecurrenceRule::new].
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the invariants are violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(
        frequency: Frequency,
        interval: u32,
        day_of_month: Option<u8>,
        day_of_week: Option<u8>,
        start_date: Date,
    ) -> Self {
        Self {
            frequency,
            interval,
            day_of_month,
            day_of_week,
            start_date,
        }
    }

    /// Check the constraints documented on [RecurrenceRule::new].
    pub fn validate(&self) -> Result<(), Error> {
        if let Frequency::Unrecognized(code) = &self.frequency {
            return Err(Error::InvalidRecurrence(format!(
                "\"{code}\" is not a frequency, expected one of daily, weekly, monthly or yearly"
            )));
        }

        if self.interval == 0 {
            return Err(Error::InvalidRecurrence(
                "the interval must be at least 1".to_owned(),
            ));
        }

        match (self.frequency.uses_day_of_month(), self.day_of_month) {
            (true, None) => {
                return Err(Error::InvalidRecurrence(format!(
                    "{} rules require a day of the month (1-31)",
                    self.frequency
                )));
            }
            (true, Some(day)) if !(1..=31).contains(&day) => {
                return Err(Error::InvalidRecurrence(format!(
                    "{day} is not a day of the month (1-31)"
                )));
            }
            (false, Some(_)) => {
                return Err(Error::InvalidRecurrence(
                    "a day of the month only applies to monthly and yearly rules".to_owned(),
                ));
            }
            _ => {}
        }

        match (self.frequency.uses_day_of_week(), self.day_of_week) {
            (true, None) => Err(Error::InvalidRecurrence(
                "weekly rules require a day of the week (0=Sunday, 6=Saturday)".to_owned(),
            )),
            (true, Some(day)) if day > 6 => Err(Error::InvalidRecurrence(format!(
                "{day} is not a day of the week (0=Sunday, 6=Saturday)"
            ))),
            (false, Some(_)) => Err(Error::InvalidRecurrence(
                "a day of the week only applies to weekly rules".to_owned(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether the rule fires on `date`.
    ///
    /// Never fires before the start date, for an unrecognised frequency, for
    /// a zero interval, or when the anchor day a frequency needs is missing.
    pub fn should_generate(&self, date: Date) -> bool {
        if date < self.start_date || self.interval == 0 {
            return false;
        }

        let interval = i64::from(self.interval);
        let days_since_start = (date - self.start_date).whole_days();

        match self.frequency {
            Frequency::Daily => days_since_start % interval == 0,
            Frequency::Weekly => {
                let Some(day_of_week) = self.day_of_week else {
                    return false;
                };

                if date.weekday().number_days_from_sunday() != day_of_week {
                    return false;
                }

                let weeks_since_start = days_since_start / 7;
                weeks_since_start % interval == 0
            }
            Frequency::Monthly => {
                let Some(day_of_month) = self.day_of_month else {
                    return false;
                };

                if date.day() != clamp_to_month(day_of_month, date.year(), date.month()) {
                    return false;
                }

                let months_since_start = i64::from(date.year() - self.start_date.year()) * 12
                    + i64::from(u8::from(date.month()))
                    - i64::from(u8::from(self.start_date.month()));
                months_since_start % interval == 0
            }
            Frequency::Yearly => {
                let Some(day_of_month) = self.day_of_month else {
                    return false;
                };

                if date.month() != self.start_date.month() {
                    return false;
                }

                if date.day() != clamp_to_month(day_of_month, date.year(), date.month()) {
                    return false;
                }

                let years_since_start = i64::from(date.year() - self.start_date.year());
                years_since_start % interval == 0
            }
            Frequency::Unrecognized(_) => false,
        }
    }
}

/// The last day of `month` in `year`.
pub fn last_day_of_month(year: i32, month: Month) -> u8 {
    match month {
        Month::February if is_leap_year(year) => 29,
        Month::February => 28,
        Month::April | Month::June | Month::September | Month::November => 30,
        _ => 31,
    }
}

/// `day`, or the last day of the month if the month is shorter than that.
fn clamp_to_month(day: u8, year: i32, month: Month) -> u8 {
    day.min(last_day_of_month(year, month))
}



#[cfg(test)]
mod should_generate_tests {
    use time::{Date, Duration, macros::date};

    use crate::recurrence::{Frequency, RecurrenceRule};

    fn days(start: Date, end: Date) -> impl Iterator<Item = Date> {
        std::iter::successors(Some(start), |date| date.next_day())
            .take_while(move |date| *date <= end)
    }

    fn firing_dates(rule: &RecurrenceRule, start: Date, end: Date) -> Vec<Date> {
        days(start, end).filter(|date| rule.should_generate(*date)).collect()
    }

    #[test]
    fn daily_with_interval_one_fires_every_day_from_start() {
        let start = date!(2023 - 12 - 20);
        let rule = RecurrenceRule::new_unchecked(Frequency::Daily, 1, None, None, start);

        for date in days(start, start + Duration::days(800)) {
            assert!(rule.should_generate(date), "expected {date} to fire");
        }
    }

    #[test]
    fn daily_fires_on_start_date() {
        let start = date!(2024 - 05 - 17);
        let rule = RecurrenceRule::new_unchecked(Frequency::Daily, 9, None, None, start);

        assert!(rule.should_generate(start));
    }

    #[test]
    fn daily_with_interval_three_fires_every_third_day() {
        let start = date!(2024 - 02 - 27);
        let rule = RecurrenceRule::new_unchecked(Frequency::Daily, 3, None, None, start);

        let got = firing_dates(&rule, start, date!(2024 - 03 - 08));

        assert_eq!(
            got,
            vec![
                date!(2024 - 02 - 27),
                date!(2024 - 03 - 01),
                date!(2024 - 03 - 04),
                date!(2024 - 03 - 07),
            ]
        );
    }

    #[test]
    fn never_fires_before_start_date() {
        let start = date!(2024 - 03 - 01);
        let rule = RecurrenceRule::new_unchecked(Frequency::Daily, 1, None, None, start);

        assert!(!rule.should_generate(date!(2024 - 02 - 29)));
        assert!(!rule.should_generate(date!(2023 - 03 - 01)));
    }

    #[test]
    fn weekly_fires_every_other_monday() {
        // 2024-01-01 is a Monday.
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Weekly,
            2,
            None,
            Some(1),
            date!(2024 - 01 - 01),
        );

        assert!(rule.should_generate(date!(2024 - 01 - 01)));
        assert!(!rule.should_generate(date!(2024 - 01 - 08)));
        assert!(rule.should_generate(date!(2024 - 01 - 15)));
        assert!(!rule.should_generate(date!(2024 - 01 - 22)));
        assert!(rule.should_generate(date!(2024 - 01 - 29)));
    }

    #[test]
    fn weekly_only_fires_on_its_weekday() {
        let start = date!(2024 - 01 - 01);
        let rule = RecurrenceRule::new_unchecked(Frequency::Weekly, 1, None, Some(0), start);

        let got = firing_dates(&rule, start, date!(2024 - 01 - 31));

        assert_eq!(
            got,
            vec![
                date!(2024 - 01 - 07),
                date!(2024 - 01 - 14),
                date!(2024 - 01 - 21),
                date!(2024 - 01 - 28),
            ]
        );
    }

    #[test]
    fn weekly_counts_whole_weeks_from_start_date() {
        // Starts on a Wednesday, fires on Mondays every other week. The first
        // Monday is five days in, which is still week zero.
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Weekly,
            2,
            None,
            Some(1),
            date!(2024 - 01 - 03),
        );

        assert!(rule.should_generate(date!(2024 - 01 - 08)));
        assert!(!rule.should_generate(date!(2024 - 01 - 15)));
        assert!(rule.should_generate(date!(2024 - 01 - 22)));
    }

    #[test]
    fn monthly_fires_on_day_of_month() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Monthly,
            1,
            Some(15),
            None,
            date!(2024 - 01 - 15),
        );

        assert!(rule.should_generate(date!(2024 - 03 - 15)));
        assert!(!rule.should_generate(date!(2024 - 03 - 14)));
        assert!(!rule.should_generate(date!(2024 - 03 - 16)));
    }

    #[test]
    fn monthly_day_31_falls_on_last_day_of_thirty_day_month() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Monthly,
            1,
            Some(31),
            None,
            date!(2024 - 01 - 31),
        );

        let got = firing_dates(&rule, date!(2024 - 04 - 01), date!(2024 - 04 - 30));

        assert_eq!(got, vec![date!(2024 - 04 - 30)]);
    }

    #[test]
    fn monthly_day_31_falls_on_last_day_of_february() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Monthly,
            1,
            Some(31),
            None,
            date!(2023 - 01 - 31),
        );

        let leap = firing_dates(&rule, date!(2024 - 02 - 01), date!(2024 - 02 - 29));
        let common = firing_dates(&rule, date!(2023 - 02 - 01), date!(2023 - 02 - 28));

        assert_eq!(leap, vec![date!(2024 - 02 - 29)]);
        assert_eq!(common, vec![date!(2023 - 02 - 28)]);
    }

    #[test]
    fn monthly_day_31_fires_once_in_thirty_one_day_month() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Monthly,
            1,
            Some(31),
            None,
            date!(2024 - 01 - 31),
        );

        let got = firing_dates(&rule, date!(2024 - 05 - 01), date!(2024 - 05 - 31));

        assert_eq!(got, vec![date!(2024 - 05 - 31)]);
    }

    #[test]
    fn monthly_with_interval_counts_calendar_months_across_years() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Monthly,
            3,
            Some(10),
            None,
            date!(2023 - 11 - 10),
        );

        let got = firing_dates(&rule, date!(2023 - 11 - 01), date!(2024 - 12 - 31));

        assert_eq!(
            got,
            vec![
                date!(2023 - 11 - 10),
                date!(2024 - 02 - 10),
                date!(2024 - 05 - 10),
                date!(2024 - 08 - 10),
                date!(2024 - 11 - 10),
            ]
        );
    }

    #[test]
    fn yearly_fires_on_start_month_and_day() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Yearly,
            1,
            Some(10),
            None,
            date!(2020 - 07 - 10),
        );

        let got = firing_dates(&rule, date!(2020 - 01 - 01), date!(2023 - 12 - 31));

        assert_eq!(
            got,
            vec![
                date!(2020 - 07 - 10),
                date!(2021 - 07 - 10),
                date!(2022 - 07 - 10),
                date!(2023 - 07 - 10),
            ]
        );
    }

    #[test]
    fn yearly_february_29_falls_on_february_28_in_common_years() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Yearly,
            1,
            Some(29),
            None,
            date!(2024 - 02 - 29),
        );

        let common = firing_dates(&rule, date!(2025 - 02 - 01), date!(2025 - 03 - 31));
        let leap = firing_dates(&rule, date!(2028 - 02 - 01), date!(2028 - 03 - 31));

        assert_eq!(common, vec![date!(2025 - 02 - 28)]);
        assert_eq!(leap, vec![date!(2028 - 02 - 29)]);
    }

    #[test]
    fn yearly_with_interval_skips_years() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Yearly,
            2,
            Some(1),
            None,
            date!(2020 - 03 - 01),
        );

        assert!(rule.should_generate(date!(2022 - 03 - 01)));
        assert!(!rule.should_generate(date!(2023 - 03 - 01)));
        assert!(rule.should_generate(date!(2024 - 03 - 01)));
    }

    #[test]
    fn yearly_ignores_other_months() {
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Yearly,
            1,
            Some(1),
            None,
            date!(2020 - 03 - 01),
        );

        assert!(!rule.should_generate(date!(2021 - 04 - 01)));
    }

    #[test]
    fn unrecognized_frequency_never_fires() {
        let start = date!(2024 - 01 - 01);
        let rule = RecurrenceRule::new_unchecked(
            Frequency::Unrecognized("hourly".to_owned()),
            1,
            Some(1),
            Some(1),
            start,
        );

        assert!(firing_dates(&rule, start, date!(2024 - 12 - 31)).is_empty());
    }

    #[test]
    fn missing_anchor_or_zero_interval_never_fires() {
        let start = date!(2024 - 01 - 01);
        let weekly = RecurrenceRule::new_unchecked(Frequency::Weekly, 1, None, None, start);
        let monthly = RecurrenceRule::new_unchecked(Frequency::Monthly, 1, None, None, start);
        let zero = RecurrenceRule::new_unchecked(Frequency::Daily, 0, None, None, start);

        for rule in [weekly, monthly, zero] {
            assert!(firing_dates(&rule, start, date!(2024 - 03 - 31)).is_empty());
        }
    }
}
