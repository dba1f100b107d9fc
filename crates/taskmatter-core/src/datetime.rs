//! Free-text date resolution.
//!
//! Task files carry `planned` and `due` values as free text. Everything
//! downstream only needs a calendar day plus, when the text named one, a
//! time of day, so resolution is expressed as the [`DateResolver`]
//! capability and [`NaturalDateResolver`] is the implementation the CLI
//! wires in.

use std::sync::OnceLock;

use chrono::{
  Datelike,
  Duration,
  Months,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Timelike,
  Weekday
};
use regex::Regex;

const STORAGE_DATE_FORMAT: &str =
  "%B %-d, %Y";

/// Whether a resolved date names a day
/// or a specific time on that day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Precision {
  Day,
  Time
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct ResolvedDate {
  pub date:      NaiveDate,
  pub precision: Precision,
  pub time:      Option<NaiveTime>
}

impl ResolvedDate {
  #[must_use]
  pub fn day(date: NaiveDate) -> Self {
    Self {
      date,
      precision: Precision::Day,
      time: None
    }
  }

  #[must_use]
  pub fn at(
    datetime: NaiveDateTime
  ) -> Self {
    Self {
      date:      datetime.date(),
      precision: Precision::Time,
      time:      Some(datetime.time())
    }
  }

  /// Display label for the time of day,
  /// `None` for day-only dates.
  #[must_use]
  pub fn time_label(
    &self
  ) -> Option<String> {
    match (self.precision, self.time) {
      | (Precision::Time, Some(time)) => {
        Some(format_time_label(time))
      }
      | _ => None
    }
  }

  /// Canonical text written back into
  /// task files, e.g. `January 5, 2026,
  /// 3:30 PM`.
  #[must_use]
  pub fn to_storage_string(
    &self
  ) -> String {
    let day = self
      .date
      .format(STORAGE_DATE_FORMAT)
      .to_string();
    match (self.precision, self.time) {
      | (Precision::Time, Some(time))
        if time.second() == 0 =>
      {
        format!(
          "{day}, {}",
          time.format("%-I:%M %p")
        )
      }
      | (Precision::Time, Some(time)) => {
        format!(
          "{day}, {}",
          time.format("%-I:%M:%S %p")
        )
      }
      | _ => day
    }
  }
}

#[must_use]
pub fn format_time_label(
  time: NaiveTime
) -> String {
  if time.minute() == 0
    && time.second() == 0
  {
    match time.hour() {
      | 12 => "Noon".to_string(),
      | 0 => "Midnight".to_string(),
      | _ => {
        time.format("%-I %p").to_string()
      }
    }
  } else if time.second() == 0 {
    time.format("%-I:%M %p").to_string()
  } else {
    time
      .format("%-I:%M:%S %p")
      .to_string()
  }
}

/// Turns free text into a calendar date.
///
/// Implementations must be deterministic
/// for a given input; the rendering core
/// may resolve the same text more than
/// once.
pub trait DateResolver {
  fn resolve(
    &self,
    text: &str
  ) -> Option<ResolvedDate>;
}

/// Pattern-based resolver anchored at a
/// fixed local "now".
#[derive(Debug, Clone, Copy)]
pub struct NaturalDateResolver {
  now: NaiveDateTime
}

impl NaturalDateResolver {
  #[must_use]
  pub fn new(now: NaiveDateTime) -> Self {
    Self { now }
  }
}

impl DateResolver for NaturalDateResolver {
  fn resolve(
    &self,
    text: &str
  ) -> Option<ResolvedDate> {
    parse_date_expr(text, self.now)
  }
}

#[tracing::instrument(level = "trace", skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: NaiveDateTime
) -> Option<ResolvedDate> {
  let token = input.trim();
  if token.is_empty() {
    return None;
  }
  let lower = token
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_ascii_lowercase();
  let today = now.date();

  if lower == "now" {
    return Some(ResolvedDate::at(now));
  }

  if let Some(date) =
    parse_day_expr(&lower, today)
  {
    return Some(ResolvedDate::day(date));
  }

  if let Some(time) =
    parse_clock_time(&lower)
  {
    return Some(ResolvedDate::at(
      today.and_time(time)
    ));
  }

  if let Some(Offset::Minutes(minutes)) =
    parse_offset(&lower)
  {
    let shifted = now.checked_add_signed(
      Duration::try_minutes(minutes)?
    )?;
    return Some(ResolvedDate::at(
      shifted
    ));
  }

  if let Some(resolved) = parse_iso(token)
  {
    return Some(resolved);
  }

  let resolved =
    parse_day_with_time(&lower, today);
  if resolved.is_none() {
    tracing::trace!(
      "unresolvable date expression"
    );
  }
  resolved
}

fn parse_day_with_time(
  lower: &str,
  today: NaiveDate
) -> Option<ResolvedDate> {
  for (idx, _) in lower
    .char_indices()
    .filter(|(_, c)| *c == ' ')
  {
    let day_part = lower[..idx]
      .trim_end_matches(',')
      .trim();
    let rest = lower[idx + 1..].trim();
    let clock_part = rest
      .strip_prefix("at ")
      .unwrap_or(rest);

    let Some(time) =
      parse_clock_time(clock_part)
    else {
      continue;
    };
    if let Some(date) =
      parse_day_expr(day_part, today)
    {
      return Some(ResolvedDate::at(
        date.and_time(time)
      ));
    }
  }
  None
}

fn parse_day_expr(
  lower: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  match lower {
    | "today" => return Some(today),
    | "tomorrow" => {
      return today.succ_opt();
    }
    | "yesterday" => {
      return today.pred_opt();
    }
    | _ => {}
  }

  if lower.len() == 4
    && lower
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 = lower.parse().ok()?;
    return NaiveDate::from_ymd_opt(
      year, 1, 1
    );
  }

  if let Some(target) =
    parse_weekday_name(lower)
  {
    return Some(next_weekday_date(
      today, target
    ));
  }

  if let Some(rest) =
    lower.strip_prefix("next ")
    && let Some(target) =
      parse_weekday_name(rest)
  {
    return Some(next_weekday_date(
      today, target
    ));
  }

  if let Some(rest) =
    lower.strip_prefix("last ")
    && let Some(target) =
      parse_weekday_name(rest)
  {
    return Some(prev_weekday_date(
      today, target
    ));
  }

  match parse_offset(lower) {
    | Some(Offset::Days(days)) => {
      return today.checked_add_signed(
        Duration::try_days(days)?
      );
    }
    | Some(Offset::Months(months)) => {
      return shift_months(today, months);
    }
    | Some(Offset::Minutes(_)) => {
      return None;
    }
    | None => {}
  }

  if let Some(target_month) =
    parse_month_name(lower)
  {
    let candidate =
      NaiveDate::from_ymd_opt(
        today.year(),
        target_month,
        1
      )?;
    if candidate <= today {
      return NaiveDate::from_ymd_opt(
        today.year().saturating_add(1),
        target_month,
        1
      );
    }
    return Some(candidate);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      lower, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  parse_month_day(lower, today)
}

fn parse_month_day(
  lower: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  let patterns = date_patterns()?;

  let (month, day, year) =
    if let Some(caps) =
      patterns.month_day.captures(lower)
    {
      (
        parse_month_name(
          caps.name("month")?.as_str()
        )?,
        caps.name("day")?.as_str(),
        caps.name("year")
      )
    } else if let Some(caps) =
      patterns.day_month.captures(lower)
    {
      (
        parse_month_name(
          caps.name("month")?.as_str()
        )?,
        caps.name("day")?.as_str(),
        caps.name("year")
      )
    } else if let Some(caps) =
      patterns.numeric.captures(lower)
    {
      (
        caps
          .name("month")?
          .as_str()
          .parse()
          .ok()?,
        caps.name("day")?.as_str(),
        caps.name("year")
      )
    } else {
      return None;
    };

  let day: u32 = day.parse().ok()?;
  let year = match year {
    | Some(raw) => {
      raw.as_str().parse().ok()?
    }
    | None => today.year()
  };
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

fn parse_iso(
  token: &str
) -> Option<ResolvedDate> {
  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Some(ResolvedDate::at(ndt));
  }

  if let Ok(dt) =
    chrono::DateTime::parse_from_rfc3339(
      token
    )
  {
    return Some(ResolvedDate::at(
      dt.naive_local()
    ));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(ResolvedDate::at(ndt));
    }
  }

  None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Offset {
  Days(i64),
  Months(i32),
  Minutes(i64)
}

fn parse_offset(
  lower: &str
) -> Option<Offset> {
  let patterns = date_patterns()?;

  if let Some(caps) =
    patterns.signed.captures(lower)
  {
    let num: i64 = caps
      .name("num")?
      .as_str()
      .parse()
      .ok()?;
    let num = if &caps["sign"] == "-" {
      -num
    } else {
      num
    };
    return match &caps["unit"] {
      | "d" => Some(Offset::Days(num)),
      | "w" => {
        Some(Offset::Days(
          num.checked_mul(7)?
        ))
      }
      | "h" => {
        Some(Offset::Minutes(
          num.checked_mul(60)?
        ))
      }
      | "m" => Some(Offset::Minutes(num)),
      | _ => None
    };
  }

  let (count, unit, sign) =
    if let Some(caps) =
      patterns.in_n_units.captures(lower)
    {
      (
        caps.name("num")?.as_str(),
        caps.name("unit")?.as_str(),
        1
      )
    } else if let Some(caps) =
      patterns.n_units_ago.captures(lower)
    {
      (
        caps.name("num")?.as_str(),
        caps.name("unit")?.as_str(),
        -1
      )
    } else if let Some(caps) =
      patterns.next_last.captures(lower)
    {
      let sign =
        if &caps["dir"] == "last" {
          -1
        } else {
          1
        };
      ("1", caps.name("unit")?.as_str(), sign)
    } else {
      return None;
    };

  let count: i64 = match count {
    | "a" | "an" | "one" => 1,
    | raw => raw.parse().ok()?
  };
  let count = count.checked_mul(sign)?;

  match unit {
    | "day" => Some(Offset::Days(count)),
    | "week" => {
      Some(Offset::Days(
        count.checked_mul(7)?
      ))
    }
    | "month" => {
      Some(Offset::Months(
        i32::try_from(count).ok()?
      ))
    }
    | "year" => {
      Some(Offset::Months(
        i32::try_from(
          count.checked_mul(12)?
        )
        .ok()?
      ))
    }
    | "hour" => {
      Some(Offset::Minutes(
        count.checked_mul(60)?
      ))
    }
    | "minute" => {
      Some(Offset::Minutes(count))
    }
    | _ => None
  }
}

/// Shifts by whole calendar months,
/// clamping the day to the target
/// month's length.
#[must_use]
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> Option<NaiveDate> {
  let magnitude =
    Months::new(months.unsigned_abs());
  if months >= 0 {
    date.checked_add_months(magnitude)
  } else {
    date.checked_sub_months(magnitude)
  }
}

struct DatePatterns {
  signed:      Regex,
  in_n_units:  Regex,
  n_units_ago: Regex,
  next_last:   Regex,
  month_day:   Regex,
  day_month:   Regex,
  numeric:     Regex,
  clock:       Regex
}

fn date_patterns()
-> Option<&'static DatePatterns> {
  static PATTERNS: OnceLock<
    Option<DatePatterns>
  > = OnceLock::new();
  PATTERNS
    .get_or_init(|| {
      let compiled = DatePatterns::new();
      if let Err(err) = &compiled {
        tracing::error!(
          error = %err,
          "internal regex compile failure"
        );
      }
      compiled.ok()
    })
    .as_ref()
}

impl DatePatterns {
  fn new() -> Result<Self, regex::Error> {
    Ok(Self {
      signed:      Regex::new(
        r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwhm])$"
      )?,
      in_n_units:  Regex::new(
        r"^in (?P<num>\d+|a|an|one) (?P<unit>day|week|month|year|hour|minute)s?$"
      )?,
      n_units_ago: Regex::new(
        r"^(?P<num>\d+|a|an|one) (?P<unit>day|week|month|year|hour|minute)s? ago$"
      )?,
      next_last:   Regex::new(
        r"^(?P<dir>next|last) (?P<unit>day|week|month|year)$"
      )?,
      month_day:   Regex::new(
        r"^(?P<month>[a-z]+)\.? (?P<day>\d{1,2})(?:st|nd|rd|th)?(?:,? (?P<year>\d{4}))?$"
      )?,
      day_month:   Regex::new(
        r"^(?P<day>\d{1,2})(?:st|nd|rd|th)? (?P<month>[a-z]+)\.?(?:,? (?P<year>\d{4}))?$"
      )?,
      numeric:     Regex::new(
        r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{4})$"
      )?,
      clock:       Regex::new(
        r"^(?P<hour>\d{1,2})(?::(?P<minute>\d{2})(?::(?P<second>\d{2}))?)?\s*(?P<ampm>[ap]\.?m\.?)?$"
      )?
    })
  }
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

fn prev_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + from_idx - target_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_sub_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

fn parse_clock_time(
  token: &str
) -> Option<NaiveTime> {
  match token.trim() {
    | "noon" => {
      return NaiveTime::from_hms_opt(
        12, 0, 0
      );
    }
    | "midnight" => {
      return NaiveTime::from_hms_opt(
        0, 0, 0
      );
    }
    | _ => {}
  }

  let captures = date_patterns()?
    .clock
    .captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = match captures
    .name("minute")
  {
    | Some(m) => {
      m.as_str().parse::<u32>().ok()?
    }
    | None => 0
  };
  let second = match captures
    .name("second")
  {
    | Some(s) => {
      s.as_str().parse::<u32>().ok()?
    }
    | None => 0
  };
  let ampm = captures
    .name("ampm")
    .map(|m| m.as_str().replace('.', ""));

  // A bare number is not a clock time.
  if captures.name("minute").is_none()
    && ampm.is_none()
  {
    return None;
  }

  let hour = if let Some(ampm) = ampm {
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm.as_str() {
      | "am" => {
        if raw_hour == 12 {
          0
        } else {
          raw_hour
        }
      }
      | "pm" => {
        if raw_hour == 12 {
          12
        } else {
          raw_hour + 12
        }
      }
      | _ => return None
    }
  } else {
    raw_hour
  };

  NaiveTime::from_hms_opt(
    hour, minute, second
  )
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
