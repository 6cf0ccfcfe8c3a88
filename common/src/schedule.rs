// Cron expression parsing and next firing time calculation
//
// Schedules are written in the classic cron dialect (5, 6 or 7 fields,
// Sunday = 0 or 7). The `cron` crate wants seconds first and numbers Sunday
// as 1, so expressions are normalised before parsing.

use crate::errors::ScheduleError;
use chrono::offset::LocalResult;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse and validate a cron expression in the classic dialect
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    let normalized = normalize_expression(expression)?;
    CronSchedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a schedule timezone; empty means UTC
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    Tz::from_str(name).map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Next cron-aligned instant strictly after `after`, evaluated in `timezone`
///
/// The expression is matched against local wall-clock time. A wall time
/// repeated by a backward transition fires at its earliest instant that is
/// still after `after`; a wall time skipped by a forward transition fires
/// shifted forward by the gap.
pub fn next_fire_time(
    cron: &CronSchedule,
    timezone: Tz,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let local_reference = after.with_timezone(&timezone).naive_local();
    // Wall-clock candidates, carried as UTC-labelled naive times
    let wall_reference = Utc.from_utc_datetime(&local_reference);

    cron.after(&wall_reference)
        .take(MAX_CANDIDATES)
        .find_map(|candidate| resolve_local(timezone, candidate.naive_utc(), after))
}

const MAX_CANDIDATES: usize = 1024;

fn resolve_local(timezone: Tz, wall: NaiveDateTime, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let instant = match timezone.from_local_datetime(&wall) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, latest) => {
            let earliest = earliest.with_timezone(&Utc);
            if earliest > after {
                earliest
            } else {
                latest.with_timezone(&Utc)
            }
        }
        LocalResult::None => {
            // Offset in effect before the gap
            let before = Utc.from_utc_datetime(&(wall - ChronoDuration::days(1)));
            let offset = timezone.offset_from_utc_datetime(&before.naive_utc()).fix();
            Utc.from_utc_datetime(&(wall - offset))
        }
    };

    (instant > after).then_some(instant)
}

/// Parse `expression` and compute its next firing after `after` in `timezone`
pub fn next_after(
    expression: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let cron = parse_cron_expression(expression)?;
    let tz = parse_timezone(timezone)?;
    next_fire_time(&cron, tz, after)
        .ok_or_else(|| ScheduleError::NoNextExecution(expression.to_string()))
}

/// Rewrite a classic cron expression into the second-precision dialect
fn normalize_expression(expression: &str) -> Result<String, ScheduleError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();

    let mut fields: Vec<String> = match fields.len() {
        // min hour dom month dow [year]
        5 | 6 => std::iter::once("0")
            .chain(fields.iter().copied())
            .map(str::to_string)
            .collect(),
        // sec min hour dom month dow year
        7 => fields.iter().map(|f| f.to_string()).collect(),
        n => {
            return Err(ScheduleError::InvalidCronExpression {
                expression: expression.to_string(),
                reason: format!("expected 5, 6 or 7 fields, found {}", n),
            })
        }
    };

    fields[5] = normalize_day_of_week(&fields[5]).map_err(|reason| {
        ScheduleError::InvalidCronExpression {
            expression: expression.to_string(),
            reason,
        }
    })?;

    Ok(fields.join(" "))
}

/// Map day-of-week numerals from 0-7 (Sunday = 0 or 7) to 1-7 (Sunday = 1)
fn normalize_day_of_week(field: &str) -> Result<String, String> {
    let mut parts = Vec::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };

        let mapped = match range.split_once('-') {
            Some((start, end)) => match (parse_dow(start)?, parse_dow(end)?) {
                (Some(start), Some(end)) => map_dow_range(start, end)?,
                (None, None) => range.to_string(),
                _ => return Err(format!("mixed names and numbers in '{}'", range)),
            },
            None => match parse_dow(range)? {
                Some(day) => map_dow(day).to_string(),
                None => range.to_string(),
            },
        };

        match step {
            Some(_) if mapped.contains(',') => {
                return Err(format!("step not supported on wrapping range '{}'", part))
            }
            Some(step) => parts.push(format!("{}/{}", mapped, step)),
            None => parts.push(mapped),
        }
    }

    Ok(parts.join(","))
}

/// Numeric day of week, or None for names and wildcards
fn parse_dow(token: &str) -> Result<Option<u8>, String> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match token.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(Some(day)),
        _ => Err(format!("day of week out of range: {}", token)),
    }
}

fn map_dow(day: u8) -> u8 {
    (day % 7) + 1
}

fn map_dow_range(start: u8, end: u8) -> Result<String, String> {
    if start > end {
        return Err(format!("invalid day of week range {}-{}", start, end));
    }
    // 7 is Sunday again; a range ending on it wraps to the start of the week
    if end == 7 && start > 0 {
        if start == 7 {
            return Ok("1".to_string());
        }
        return Ok(format!("{}-7,1", map_dow(start)));
    }
    let end = if end == 7 { 6 } else { end };
    if start == end {
        return Ok(map_dow(start).to_string());
    }
    Ok(format!("{}-{}", map_dow(start), map_dow(end)))
}
