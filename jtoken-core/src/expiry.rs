//! Expiry resolution for issued tokens.
//!
//! The `exp` claim is chosen by precedence: an explicit absolute timestamp,
//! then a relative period such as `"+2 hours"`, then the configured
//! [`ExpireMode`]. With no mode at all the token lives for ten years.

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};

use crate::algorithm::ExpireMode;
use crate::error::TokenError;

/// Lifetime used when neither an explicit expiry nor a mode is configured
const FALLBACK_MONTHS: u32 = 12 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

impl PeriodUnit {
    fn parse(word: &str) -> Option<Self> {
        let unit = match word {
            "s" | "sec" | "secs" | "second" | "seconds" => PeriodUnit::Second,
            "min" | "mins" | "minute" | "minutes" => PeriodUnit::Minute,
            "h" | "hour" | "hours" => PeriodUnit::Hour,
            "d" | "day" | "days" => PeriodUnit::Day,
            "w" | "week" | "weeks" => PeriodUnit::Week,
            "fortnight" | "fortnights" => PeriodUnit::Fortnight,
            "month" | "months" => PeriodUnit::Month,
            "y" | "year" | "years" => PeriodUnit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn seconds(&self) -> Option<i64> {
        match self {
            PeriodUnit::Second => Some(1),
            PeriodUnit::Minute => Some(60),
            PeriodUnit::Hour => Some(3_600),
            PeriodUnit::Day => Some(86_400),
            PeriodUnit::Week => Some(7 * 86_400),
            PeriodUnit::Fortnight => Some(14 * 86_400),
            PeriodUnit::Month | PeriodUnit::Year => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeriodTerm {
    amount: i64,
    unit: PeriodUnit,
}

/// A human readable offset from "now", e.g. `"+ 10 minutes"` or `"+1 day 2 hours"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePeriod {
    expression: String,
    terms: Vec<PeriodTerm>,
}

impl RelativePeriod {
    /// Parse a relative period expression.
    ///
    /// Each term is an optional sign, an integer and a unit. `"now"` is a
    /// zero offset.
    pub fn parse(expression: &str) -> Result<Self, TokenError> {
        let normalized = expression.trim().to_ascii_lowercase();
        if normalized == "now" {
            return Ok(Self {
                expression: expression.to_string(),
                terms: Vec::new(),
            });
        }

        let invalid = || TokenError::invalid_period(expression);
        let mut terms = Vec::new();
        let mut chars = normalized.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let mut negative = false;
            if let Some(sign) = chars.next_if(|c| *c == '+' || *c == '-') {
                negative = sign == '-';
                while chars.next_if(|c| c.is_whitespace()).is_some() {}
            }

            let mut digits = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                digits.push(d);
            }
            if digits.is_empty() {
                return Err(invalid());
            }
            let mut amount: i64 = digits.parse().map_err(|_| invalid())?;
            if negative {
                amount = -amount;
            }

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let mut word = String::new();
            while let Some(c) = chars.next_if(|c| c.is_ascii_alphabetic()) {
                word.push(c);
            }
            let unit = PeriodUnit::parse(&word).ok_or_else(invalid)?;

            terms.push(PeriodTerm { amount, unit });
        }

        if terms.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            expression: expression.to_string(),
            terms,
        })
    }

    /// The expression this period was parsed from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Apply the offset to `now`
    pub fn apply(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, TokenError> {
        let invalid = || TokenError::invalid_period(self.expression.clone());
        let mut at = now;

        for term in &self.terms {
            at = match term.unit.seconds() {
                Some(unit_seconds) => {
                    let seconds = term.amount.checked_mul(unit_seconds).ok_or_else(invalid)?;
                    let delta = Duration::try_seconds(seconds).ok_or_else(invalid)?;
                    at.checked_add_signed(delta).ok_or_else(invalid)?
                }
                None => {
                    let per_unit = if term.unit == PeriodUnit::Year { 12 } else { 1 };
                    let months = term
                        .amount
                        .unsigned_abs()
                        .checked_mul(per_unit)
                        .and_then(|m| u32::try_from(m).ok())
                        .ok_or_else(invalid)?;
                    if term.amount < 0 {
                        at.checked_sub_months(Months::new(months))
                    } else {
                        at.checked_add_months(Months::new(months))
                    }
                    .ok_or_else(invalid)?
                }
            };
        }

        Ok(at)
    }
}

impl fmt::Display for RelativePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// The expiry configuration of a token builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Absolute unix timestamp, wins over everything else
    pub expires_ts: Option<i64>,
    /// Relative period, used when no timestamp is set
    pub period: Option<RelativePeriod>,
    /// Named lifetime, used when neither of the above is set
    pub mode: Option<ExpireMode>,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            expires_ts: None,
            period: None,
            mode: Some(ExpireMode::default()),
        }
    }
}

impl ExpiryPolicy {
    /// Resolve the `exp` claim, as a unix timestamp, for a token issued at `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<i64, TokenError> {
        if let Some(ts) = self.expires_ts {
            return Ok(ts);
        }

        if let Some(period) = &self.period {
            return Ok(period.apply(now)?.timestamp());
        }

        let expires = match self.mode {
            Some(mode) => mode.expires_at(now),
            None => now.checked_add_months(Months::new(FALLBACK_MONTHS)),
        };

        expires
            .map(|at| at.timestamp())
            .ok_or_else(|| TokenError::invalid_period("expiry out of range"))
    }
}

/// Resolve an expiry timestamp from loose configuration values.
///
/// Same precedence as [`ExpiryPolicy::resolve`]; the period text is parsed here
/// and an unparseable one fails with `TokenError::InvalidPeriod`.
pub fn resolve_expiry(
    explicit_ts: Option<i64>,
    period: Option<&str>,
    mode: Option<ExpireMode>,
    now: DateTime<Utc>,
) -> Result<i64, TokenError> {
    let period = period.map(RelativePeriod::parse).transpose()?;
    ExpiryPolicy {
        expires_ts: explicit_ts,
        period,
        mode,
    }
    .resolve(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_parse_periods() {
        let now = now();
        let cases = [
            ("+ 10 minutes", 600),
            ("+2 hours", 7_200),
            ("1 day", 86_400),
            ("+1 week", 604_800),
            ("-30 sec", -30),
            ("+1 day 2 hours", 93_600),
            ("+1 fortnight", 1_209_600),
            ("NOW", 0),
        ];
        for (expr, offset) in cases {
            let period = RelativePeriod::parse(expr).unwrap();
            let at = period.apply(now).unwrap();
            assert_eq!(at.timestamp() - now.timestamp(), offset, "{expr}");
        }
    }

    #[test]
    fn test_calendar_periods() {
        let now = now();
        let month = RelativePeriod::parse("+1 month").unwrap().apply(now).unwrap();
        assert_eq!(month, Utc.with_ymd_and_hms(2024, 4, 10, 8, 30, 0).unwrap());

        let years = RelativePeriod::parse("+2 years").unwrap().apply(now).unwrap();
        assert_eq!(years, Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap());

        let back = RelativePeriod::parse("-1 month").unwrap().apply(now).unwrap();
        assert_eq!(back, Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for expr in ["", "soon", "+ hours", "10", "+10 parsecs", "++1 day"] {
            assert!(
                matches!(RelativePeriod::parse(expr), Err(TokenError::InvalidPeriod(_))),
                "{expr}"
            );
        }
    }

    #[test]
    fn test_precedence() {
        let now = now();
        let ts = now.timestamp();

        let explicit = resolve_expiry(Some(42), Some("+1 hour"), Some(ExpireMode::Strict), now);
        assert_eq!(explicit.unwrap(), 42);

        let period = resolve_expiry(None, Some("+1 hour"), Some(ExpireMode::Strict), now);
        assert_eq!(period.unwrap(), ts + 3_600);

        let strict = resolve_expiry(None, None, Some(ExpireMode::Strict), now);
        assert_eq!(strict.unwrap(), ts + 86_400);

        let middle = resolve_expiry(None, None, Some(ExpireMode::Middle), now);
        assert_eq!(middle.unwrap(), ts + 7 * 86_400);

        let low = resolve_expiry(None, None, Some(ExpireMode::Low), now);
        assert_eq!(
            low.unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 10, 8, 30, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_no_mode_falls_back_to_ten_years() {
        let now = now();
        let exp = resolve_expiry(None, None, None, now).unwrap();
        assert_eq!(
            exp,
            Utc.with_ymd_and_hms(2034, 3, 10, 8, 30, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_invalid_period_text() {
        let err = resolve_expiry(None, Some("whenever"), None, now()).unwrap_err();
        assert_eq!(err, TokenError::InvalidPeriod("whenever".to_string()));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let policy = ExpiryPolicy::default();
        let now = now();
        assert_eq!(policy.resolve(now).unwrap(), policy.resolve(now).unwrap());
    }
}
