use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::stats::{BeerStats, UserStats};
use crate::untappd::Checkin;

const TIMESTAMP_FORMAT: &str = "%d %b %Y %H:%M";

/// Announcement for a new check-in: alert, style, rating and, when the
/// check-in has a venue, a venue line. Each line is sent separately.
pub fn checkin_lines(checkin: &Checkin) -> Vec<String> {
    let mut lines = vec![
        format!(
            "untappd alert for {}: {} ({}).",
            checkin.user_name, checkin.beer.name, checkin.brewery.name
        ),
        format!(
            "  Style: {}   ABV: {:.1}%",
            checkin.beer.style, checkin.beer.abv
        ),
        format!("  Rating: {:.1}   {}", checkin.rating, single_line(&checkin.comment))
            .trim_end()
            .to_string(),
    ];
    if let Some(venue) = &checkin.venue {
        lines.push(format!("  Venue: {}", venue.name));
    }
    lines
}

/// How another roster user rated the same beer. `None` when they never did.
pub fn peer_line(user: &str, stats: &BeerStats<'_>, zone: Option<Tz>) -> Option<String> {
    let latest = stats.most_recent?;
    let summary = if stats.count > 1 {
        format!(
            "[{:.1}-{:.1}] {:.1} #{}",
            stats.min, stats.max, stats.mean, stats.count
        )
    } else {
        String::new()
    };
    let line = format!(
        "    {} rated this on {}: {:.1}  {}  {}",
        user,
        format_timestamp(latest.created, zone),
        latest.rating,
        single_line(&latest.comment),
        summary
    );
    Some(line.trim_end().to_string())
}

pub fn statistics_heading(backfill_cap: Option<usize>) -> String {
    match backfill_cap {
        Some(cap) => format!("Statistics for up to {cap} checkins (untappd api limit)."),
        None => "Statistics for all known checkins.".to_string(),
    }
}

pub fn user_summary(user: &str, stats: &UserStats) -> String {
    format!(
        "untappd stats for {}: {} checkins with {:.2} average rating [stdev: {:.2}].",
        user, stats.count, stats.mean, stats.stdev
    )
}

/// Single-line rendering of a check-in for the process log.
pub fn log_line(checkin: &Checkin) -> String {
    checkin_lines(checkin).join("  ")
}

/// A chat line ends at the first CR or LF, so multi-line comments are folded.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn format_timestamp(created: DateTime<Utc>, zone: Option<Tz>) -> String {
    match zone {
        Some(zone) => created.with_timezone(&zone).format(TIMESTAMP_FORMAT).to_string(),
        None => created.format(TIMESTAMP_FORMAT).to_string(),
    }
}
