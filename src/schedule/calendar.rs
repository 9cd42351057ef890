use chrono::{Datelike, NaiveDate, Weekday};

use crate::errors::ProducerError;
use crate::ids::ServiceId;
use crate::schedule::table::StaticTable;

const DAY_COLUMNS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServicePattern {
    service: ServiceId,
    days: [bool; 7],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl ServicePattern {
    fn runs_on(&self, date: NaiveDate) -> bool {
        if !self.days[date.weekday().num_days_from_monday() as usize] {
            return false;
        }
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Weekly service patterns from `calendar.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCalendar {
    patterns: Vec<ServicePattern>,
}

impl ServiceCalendar {
    pub fn from_table(table: &StaticTable) -> Result<Self, ProducerError> {
        let service_col = table.column("service_id")?;
        let mut day_cols = [0usize; 7];
        for (slot, (header, _)) in day_cols.iter_mut().zip(DAY_COLUMNS) {
            *slot = table.column(header)?;
        }
        let start_col = table.optional_column("start_date");
        let end_col = table.optional_column("end_date");

        let mut patterns = Vec::with_capacity(table.len());
        for row in table.rows() {
            let mut days = [false; 7];
            for (flag, col) in days.iter_mut().zip(day_cols) {
                *flag = match row.get(col)? {
                    "1" => true,
                    "0" => false,
                    other => return Err(row.error(format!("day flag must be 0 or 1, got {other:?}"))),
                };
            }

            let parse_date = |col: Option<usize>| {
                row.get_opt(col)
                    .map(|v| {
                        NaiveDate::parse_from_str(v, "%Y%m%d")
                            .map_err(|_| row.error(format!("invalid date {v:?}")))
                    })
                    .transpose()
            };

            patterns.push(ServicePattern {
                service: ServiceId::from(row.get(service_col)?),
                days,
                start_date: parse_date(start_col)?,
                end_date: parse_date(end_col)?,
            });
        }

        Ok(Self { patterns })
    }

    /// The service running on `date`. When several match, the last listed wins.
    pub fn service_for(&self, date: NaiveDate) -> Option<&ServiceId> {
        self.patterns
            .iter()
            .rev()
            .find(|p| p.runs_on(date))
            .map(|p| &p.service)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
