use indexmap::IndexMap;
use time::macros::format_description;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendPoint {
    pub date: Date,
    pub count: usize,
}

impl TrendPoint {
    /// Short `dd/MM` axis label.
    pub fn label(&self) -> String {
        self.date
            .format(format_description!("[day]/[month]"))
            .unwrap_or_else(|_| self.date.to_string())
    }
}

/// Day buckets for the trend window, oldest first. Every day in the window
/// exists up front so the series stays dense.
#[derive(Debug, Clone)]
pub(crate) struct DailyTrend {
    buckets: IndexMap<Date, usize>,
}

impl DailyTrend {
    pub(crate) fn ending_on(today: Date, days: u16) -> Self {
        let mut dates = Vec::with_capacity(days as usize);
        let mut cursor = Some(today);
        for _ in 0..days {
            let Some(day) = cursor else {
                break;
            };
            dates.push(day);
            cursor = day.previous_day();
        }
        let buckets = dates.into_iter().rev().map(|date| (date, 0)).collect();
        Self { buckets }
    }

    /// Counts one post on `date`; dates outside the window are ignored.
    pub(crate) fn record(&mut self, date: Date) -> bool {
        match self.buckets.get_mut(&date) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn into_points(self) -> Vec<TrendPoint> {
        self.buckets
            .into_iter()
            .map(|(date, count)| TrendPoint { date, count })
            .collect()
    }
}
