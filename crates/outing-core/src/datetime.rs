use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Months,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "outing-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "OUTING_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "OUTING_TIME_CONFIG";
const DEFAULT_DISPLAY_TIMEZONE: &str =
  "Europe/London";

pub const MONTH_NAMES: [&str; 12] = [
  "January",
  "February",
  "March",
  "April",
  "May",
  "June",
  "July",
  "August",
  "September",
  "October",
  "November",
  "December"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone in which event timestamps
/// are turned into calendar days.
pub fn display_timezone() -> &'static Tz
{
  static DISPLAY_TZ: OnceLock<Tz> =
    OnceLock::new();
  DISPLAY_TZ.get_or_init(
    resolve_display_timezone
  )
}

/// Calendar day of an epoch-millisecond
/// timestamp in `tz`. `None` when the
/// timestamp is out of chrono's range.
#[must_use]
pub fn date_from_epoch_ms(
  millis: i64,
  tz: &Tz
) -> Option<NaiveDate> {
  DateTime::<Utc>::from_timestamp_millis(
    millis
  )
  .map(|dt| {
    dt.with_timezone(tz).date_naive()
  })
}

#[must_use]
pub fn first_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

/// Day count of the month containing
/// `date`, computed as the day before the
/// first of the following month.
#[must_use]
pub fn days_in_month(
  date: NaiveDate
) -> u32 {
  let first = first_of_month(date);
  first
    .checked_add_months(Months::new(1))
    .and_then(|next| next.pred_opt())
    .map(|last| last.day())
    .unwrap_or(31)
}

/// Weekday index of the first of the
/// month, 0 = Sunday.
#[must_use]
pub fn first_weekday_index(
  date: NaiveDate
) -> u32 {
  first_of_month(date)
    .weekday()
    .num_days_from_sunday()
}

/// Month shown by a calendar view. Always
/// anchored on day 1 so stepping between
/// months of different lengths never
/// skips one.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MonthCursor {
  first: NaiveDate
}

impl MonthCursor {
  #[must_use]
  pub fn containing(
    date: NaiveDate
  ) -> Self {
    Self {
      first: first_of_month(date)
    }
  }

  /// `month0` is 0-based (0 = January).
  pub fn from_year_month0(
    year: i32,
    month0: u32
  ) -> anyhow::Result<Self> {
    let first = month0
      .checked_add(1)
      .and_then(|month| {
        NaiveDate::from_ymd_opt(
          year, month, 1
        )
      })
      .ok_or_else(|| {
        anyhow!(
          "invalid year/month: \
           {year}/{month0}"
        )
      })?;
    Ok(Self {
      first
    })
  }

  #[must_use]
  pub fn first_day(&self) -> NaiveDate {
    self.first
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.first.year()
  }

  #[must_use]
  pub fn month0(&self) -> u32 {
    self.first.month0()
  }

  #[must_use]
  pub fn title(&self) -> String {
    format!(
      "{} {}",
      MONTH_NAMES
        [self.first.month0() as usize],
      self.first.year()
    )
  }

  #[must_use]
  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    date.year() == self.first.year()
      && date.month() == self.first.month()
  }

  #[must_use]
  pub fn day(
    &self,
    day: u32
  ) -> Option<NaiveDate> {
    self.first.with_day(day)
  }

  #[must_use]
  pub fn step(
    self,
    delta: i32
  ) -> Self {
    let months =
      Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
      self.first.checked_add_months(months)
    } else {
      self.first.checked_sub_months(months)
    };
    match shifted {
      | Some(first) => {
        Self {
          first
        }
      }
      | None => {
        tracing::warn!(
          delta,
          month = %self.first,
          "month navigation out of range; staying put"
        );
        self
      }
    }
  }

  #[must_use]
  pub fn previous(self) -> Self {
    self.step(-1)
  }

  #[must_use]
  pub fn next(self) -> Self {
    self.step(1)
  }
}

/// Parses `YYYY-MM` (1-based month).
#[tracing::instrument(fields(input = input))]
pub fn parse_month_expr(
  input: &str
) -> anyhow::Result<MonthCursor> {
  let month_re = Regex::new(
    r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let captures = month_re
    .captures(input.trim())
    .ok_or_else(|| {
      anyhow!(
        "expected YYYY-MM, got: {input}"
      )
    })?;

  let year = captures["year"]
    .parse::<i32>()?;
  let month = captures["month"]
    .parse::<u32>()?;
  if !(1..=12).contains(&month) {
    return Err(anyhow!(
      "month out of range: {month}"
    ));
  }
  MonthCursor::from_year_month0(
    year,
    month - 1
  )
}

/// Parses `YYYY-MM-DD`.
pub fn parse_day_expr(
  input: &str
) -> anyhow::Result<NaiveDate> {
  NaiveDate::parse_from_str(
    input.trim(),
    "%Y-%m-%d"
  )
  .map_err(|e| {
    anyhow!(
      "expected YYYY-MM-DD, got \
       {input}: {e}"
    )
  })
}

/// Validates an `HH:MM` clock string and
/// returns it normalised to two digits.
pub fn parse_clock_expr(
  input: &str
) -> anyhow::Result<String> {
  let clock_re = Regex::new(
    r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let captures = clock_re
    .captures(input.trim())
    .ok_or_else(|| {
      anyhow!(
        "expected HH:MM, got: {input}"
      )
    })?;

  let hour =
    captures["hour"].parse::<u32>()?;
  let minute =
    captures["minute"].parse::<u32>()?;
  if hour > 23 || minute > 59 {
    return Err(anyhow!(
      "clock time out of range: \
       {input}"
    ));
  }
  Ok(format!("{hour:02}:{minute:02}"))
}

#[must_use]
pub fn format_long_date(
  date: NaiveDate
) -> String {
  date.format("%B %-d, %Y").to_string()
}

#[must_use]
pub fn format_short_date(
  date: NaiveDate
) -> String {
  date.format("%b %-d, %Y").to_string()
}

#[must_use]
pub fn format_weekday_date(
  date: NaiveDate
) -> String {
  date
    .format("%A, %B %-d, %Y")
    .to_string()
}

#[must_use]
pub fn format_form_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

fn resolve_display_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_DISPLAY_TIMEZONE,
    "DEFAULT_DISPLAY_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    MonthCursor,
    date_from_epoch_ms,
    days_in_month,
    first_weekday_index,
    parse_clock_expr,
    parse_month_expr
  };

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn leap_february_has_twenty_nine_days()
  {
    assert_eq!(
      days_in_month(ymd(2024, 2, 10)),
      29
    );
    assert_eq!(
      days_in_month(ymd(2023, 2, 10)),
      28
    );
    assert_eq!(
      first_weekday_index(ymd(
        2024, 2, 20
      )),
      4
    );
  }

  #[test]
  fn stepping_from_the_31st_never_skips_a_month()
  {
    let cursor = MonthCursor::containing(
      ymd(2024, 1, 31)
    );
    let next = cursor.next();
    assert_eq!(next.year(), 2024);
    assert_eq!(next.month0(), 1);
    assert_eq!(
      next.next().month0(),
      2
    );

    let back = MonthCursor::containing(
      ymd(2024, 3, 31)
    )
    .previous();
    assert_eq!(back.month0(), 1);
  }

  #[test]
  fn stepping_across_year_boundaries() {
    let december =
      MonthCursor::from_year_month0(
        2025, 11
      )
      .expect("valid month");
    let january = december.next();
    assert_eq!(january.year(), 2026);
    assert_eq!(january.month0(), 0);
    assert_eq!(
      january.previous(),
      december
    );
    assert_eq!(
      december.step(-12).year(),
      2024
    );
  }

  #[test]
  fn out_of_range_month_is_an_error() {
    assert!(
      MonthCursor::from_year_month0(
        2024, 12
      )
      .is_err()
    );
    assert!(
      MonthCursor::from_year_month0(
        2024,
        u32::MAX
      )
      .is_err()
    );
  }

  #[test]
  fn epoch_millis_use_the_given_zone() {
    // 2024-06-30T23:30:00Z is already
    // July 1st in London (BST).
    let millis = 1_719_790_200_000;
    assert_eq!(
      date_from_epoch_ms(
        millis,
        &chrono_tz::UTC
      ),
      Some(ymd(2024, 6, 30))
    );
    assert_eq!(
      date_from_epoch_ms(
        millis,
        &chrono_tz::Europe::London
      ),
      Some(ymd(2024, 7, 1))
    );
  }

  #[test]
  fn month_and_clock_expressions() {
    let cursor =
      parse_month_expr("2024-02")
        .expect("parse month");
    assert_eq!(cursor.title(), "February 2024");
    assert!(
      parse_month_expr("2024-13").is_err()
    );
    assert_eq!(
      parse_clock_expr("9:05")
        .expect("parse clock"),
      "09:05"
    );
    assert!(
      parse_clock_expr("24:00").is_err()
    );
  }
}
