// ── History windows ──
//
// A window is the 24 hours ending at a requested instant. Past days are
// shown in full (ending 23:59:59 local time); nothing may reach past now.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use flowdash_api::fleet::sites::HistoryQuery;

const WINDOW_HOURS: i64 = 24;

/// The time span one history fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl HistoryWindow {
    /// Window ending at `requested`, evaluated in `tz` against `now`.
    ///
    /// A requested instant in the future is pulled back to `now`. If it
    /// falls on an earlier calendar day, the end moves to 23:59:59 of
    /// that day.
    pub fn ending_at(requested: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> Self {
        let requested = requested.min(now).with_timezone(&tz);
        let today = now.with_timezone(&tz).date_naive();

        let end = if requested.date_naive() == today {
            requested
        } else {
            end_of_day(requested.date_naive(), tz).unwrap_or(requested)
        };

        Self {
            start: end - Duration::hours(WINDOW_HOURS),
            end,
        }
    }

    /// The day before this one.
    pub fn previous(&self, now: DateTime<Utc>) -> Self {
        let tz = self.end.timezone();
        Self::ending_at(
            (self.end - Duration::hours(WINDOW_HOURS)).with_timezone(&Utc),
            now,
            tz,
        )
    }

    /// The day after this one, never past `now`.
    pub fn next(&self, now: DateTime<Utc>) -> Self {
        let tz = self.end.timezone();
        Self::ending_at(
            (self.end + Duration::hours(WINDOW_HOURS)).with_timezone(&Utc),
            now,
            tz,
        )
    }

    /// `true` when the window ends on today's date.
    pub fn is_today(&self, now: DateTime<Utc>) -> bool {
        self.end.date_naive() == now.with_timezone(&self.end.timezone()).date_naive()
    }

    /// Calendar-history query parameters for this window.
    pub fn query(&self) -> HistoryQuery {
        HistoryQuery {
            start: self.start.fixed_offset(),
            end: self.end.fixed_offset(),
            time_zone: self.end.timezone().name().to_owned(),
        }
    }

    /// Label for the window's end date relative to `now`.
    pub fn label(&self, now: DateTime<Utc>) -> String {
        date_label(
            self.end.date_naive(),
            now.with_timezone(&self.end.timezone()).date_naive(),
        )
    }
}

/// Today's window from local midnight to `now`, used for the daily
/// solar total.
pub fn today_so_far(now: DateTime<Utc>, tz: Tz) -> HistoryWindow {
    let end = now.with_timezone(&tz);
    let start = tz
        .from_local_datetime(&end.date_naive().and_time(NaiveTime::MIN))
        .earliest()
        .unwrap_or(end - Duration::hours(WINDOW_HOURS));
    HistoryWindow { start, end }
}

/// `"Today"`, `"Yesterday"`, or a medium date such as `"Jan 15, 2024"`.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_owned()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_owned()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}

fn end_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)?;
    tz.from_local_datetime(&date.and_time(last_second)).latest()
}
