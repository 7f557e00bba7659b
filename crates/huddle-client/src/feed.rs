//! Turning a newest-first page of messages into what a message list renders:
//! one section per calendar day, with consecutive messages from the same
//! author collapsed into a compact layout.

use chrono::{DateTime, Days, NaiveDate, TimeZone};

use huddle_types::api::MessageResponse;

/// A message shows in compact form when the previous one in its day is by
/// the same author and less than this many minutes older.
pub const COMPACT_THRESHOLD_MINUTES: i64 = 5;

#[derive(Debug)]
pub struct FeedItem<'a> {
    pub message: &'a MessageResponse,
    pub compact: bool,
}

#[derive(Debug)]
pub struct DateGroup<'a> {
    pub date: NaiveDate,
    /// Oldest first.
    pub items: Vec<FeedItem<'a>>,
}

impl DateGroup<'_> {
    /// `YYYY-MM-DD`
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Bucket `messages` (newest first, as the API delivers them) by local
/// calendar day. Buckets stay newest first; messages inside a bucket are
/// oldest first.
pub fn group_by_date<'a, Tz: TimeZone>(
    messages: &'a [MessageResponse],
    tz: &Tz,
) -> Vec<DateGroup<'a>> {
    let mut groups: Vec<(NaiveDate, Vec<&'a MessageResponse>)> = Vec::new();

    for message in messages {
        let date = message.created_at.with_timezone(tz).date_naive();
        match groups.iter_mut().find(|(d, _)| *d == date) {
            Some((_, bucket)) => bucket.push(message),
            None => groups.push((date, vec![message])),
        }
    }

    groups
        .into_iter()
        .map(|(date, mut bucket)| {
            bucket.reverse();
            let items = bucket
                .iter()
                .enumerate()
                .map(|(i, &message)| FeedItem {
                    message,
                    compact: i > 0 && is_compact(bucket[i - 1], message),
                })
                .collect();
            DateGroup { date, items }
        })
        .collect()
}

fn is_compact(prev: &MessageResponse, message: &MessageResponse) -> bool {
    prev.user.id == message.user.id
        && (message.created_at - prev.created_at).num_minutes() < COMPACT_THRESHOLD_MINUTES
}

fn relative_day(date: NaiveDate, today: NaiveDate) -> Option<&'static str> {
    if date == today {
        Some("Today")
    } else if today.checked_sub_days(Days::new(1)) == Some(date) {
        Some("Yesterday")
    } else {
        None
    }
}

/// Section header: `Today`, `Yesterday`, or e.g. `Monday, March 4`.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    match relative_day(date, today) {
        Some(label) => label.to_string(),
        None => date.format("%A, %B %-d").to_string(),
    }
}

/// Hover text for a timestamp, e.g. `Yesterday at 3:07:09 PM` or
/// `Mar 4, 2024 at 9:15:00 AM`.
pub fn full_time_label<Tz: TimeZone>(at: &DateTime<Tz>, today: NaiveDate) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let day = match relative_day(at.date_naive(), today) {
        Some(label) => label.to_string(),
        None => at.format("%b %-d, %Y").to_string(),
    };
    format!("{} at {}", day, at.format("%-I:%M:%S %p"))
}
