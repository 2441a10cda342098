use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

pub const DEFAULT_CREDITS: i64 = 3;

const SCORE_LIMIT: i64 = 99_999;

/// Whole hundredths, so averages never pass through a float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hundredths(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    #[error("value is empty")]
    Empty,
    #[error("not a plain decimal number: {0}")]
    Malformed(String),
    #[error("at most 2 fractional digits are allowed")]
    TooManyFractionDigits,
    #[error("value must be between -999.99 and 999.99")]
    OutOfRange,
}

impl Hundredths {
    pub const ZERO: Hundredths = Hundredths(0);

    pub const fn from_raw(raw: i64) -> Self {
        Hundredths(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    // Never rounds: a third fractional digit or an exponent is an error.
    pub fn parse_score(text: &str) -> Result<Self, DecimalError> {
        let t = text.trim();
        if t.is_empty() {
            return Err(DecimalError::Empty);
        }
        let (negative, body) = match t.as_bytes()[0] {
            b'-' => (true, &t[1..]),
            b'+' => (false, &t[1..]),
            _ => (false, t),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DecimalError::Malformed(t.to_string()));
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(DecimalError::Malformed(t.to_string()));
        }
        if frac_part.len() > 2 {
            return Err(DecimalError::TooManyFractionDigits);
        }

        let significant = int_part.trim_start_matches('0');
        if significant.len() > 3 {
            return Err(DecimalError::OutOfRange);
        }
        let whole: i64 = if significant.is_empty() {
            0
        } else {
            significant
                .parse()
                .map_err(|_| DecimalError::Malformed(t.to_string()))?
        };
        let mut frac: i64 = 0;
        for (i, b) in frac_part.bytes().enumerate() {
            let digit = i64::from(b - b'0');
            frac += if i == 0 { digit * 10 } else { digit };
        }

        let magnitude = whole * 100 + frac;
        if magnitude > SCORE_LIMIT {
            return Err(DecimalError::OutOfRange);
        }
        Ok(Hundredths(if negative { -magnitude } else { magnitude }))
    }
}

impl fmt::Display for Hundredths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Hundredths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradeSymbol {
    HighDistinction,
    Distinction,
    Credit,
    Pass,
    Fail,
}

impl GradeSymbol {
    pub const ALL: [GradeSymbol; 5] = [
        GradeSymbol::HighDistinction,
        GradeSymbol::Distinction,
        GradeSymbol::Credit,
        GradeSymbol::Pass,
        GradeSymbol::Fail,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "HD" => Some(Self::HighDistinction),
            "D" => Some(Self::Distinction),
            "C" => Some(Self::Credit),
            "P" => Some(Self::Pass),
            "N" => Some(Self::Fail),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighDistinction => "HD",
            Self::Distinction => "D",
            Self::Credit => "C",
            Self::Pass => "P",
            Self::Fail => "N",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::HighDistinction => "High Distinction (85-100)",
            Self::Distinction => "Distinction (75-84)",
            Self::Credit => "Credit (65-74)",
            Self::Pass => "Pass (50-64)",
            Self::Fail => "Fail (0-49)",
        }
    }

    pub fn points(self) -> Hundredths {
        match self {
            Self::HighDistinction => Hundredths::from_raw(700),
            Self::Distinction => Hundredths::from_raw(600),
            Self::Credit => Hundredths::from_raw(500),
            Self::Pass => Hundredths::from_raw(400),
            Self::Fail => Hundredths::ZERO,
        }
    }
}

impl fmt::Display for GradeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub date_enrolled: NaiveDate,
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub credits: i64,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.course_code, self.course_name)
    }
}

/// `grade` is the stored text as-is; reads stay fail-soft on unknown symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub id: String,
    pub student: String,
    pub course: String,
    pub grade: String,
    pub score: Hundredths,
    pub date_recorded: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeListing {
    pub grade: Grade,
    pub student_name: String,
    pub course_code: String,
}

impl fmt::Display for GradeListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}: {}",
            self.student_name, self.course_code, self.grade.grade
        )
    }
}
