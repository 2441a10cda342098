use crate::model::{Grade, GradeSymbol, Hundredths};
use serde::{Deserialize, Serialize};

/// How a mean that falls between two hundredths is settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundingMode {
    /// Ties go to the even hundredth: 0.025 -> 0.02.
    #[default]
    HalfEven,
    /// Ties go away from zero: 0.025 -> 0.03.
    HalfUp,
}

impl RoundingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "halfUp" => Some(Self::HalfUp),
            "halfEven" => Some(Self::HalfEven),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HalfUp => "halfUp",
            Self::HalfEven => "halfEven",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalcSettings {
    pub rounding_mode: RoundingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub average_score: Hundredths,
    pub gpa: Hundredths,
    pub grade_count: usize,
}

/// Integer division rounded to the nearest whole number. `den` must be positive.
fn round_div(num: i128, den: i128, mode: RoundingMode) -> i128 {
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    match (2 * r).cmp(&den) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => match mode {
            // q is the floor, so for a negative tie it is already the value
            // further from zero.
            RoundingMode::HalfUp => {
                if num >= 0 {
                    q + 1
                } else {
                    q
                }
            }
            RoundingMode::HalfEven => {
                if q % 2 == 0 {
                    q
                } else {
                    q + 1
                }
            }
        },
    }
}

/// Mean of fixed-point values, rounded to a whole hundredth. Empty input is 0.
pub fn mean<I>(values: I, mode: RoundingMode) -> Hundredths
where
    I: IntoIterator<Item = Hundredths>,
{
    let mut sum: i128 = 0;
    let mut count: i128 = 0;
    for v in values {
        sum += i128::from(v.raw());
        count += 1;
    }
    if count == 0 {
        return Hundredths::ZERO;
    }
    let rounded = round_div(sum, count, mode);
    // The mean of i64 values always fits back into i64.
    Hundredths::from_raw(rounded as i64)
}

/// Point value of a stored grade symbol on the 7-point scale.
/// Symbols outside HD/D/C/P/N are worth nothing.
pub fn grade_points(symbol: &str) -> Hundredths {
    GradeSymbol::parse(symbol)
        .map(GradeSymbol::points)
        .unwrap_or(Hundredths::ZERO)
}

pub fn average_score<'a, I>(grades: I, mode: RoundingMode) -> Hundredths
where
    I: IntoIterator<Item = &'a Grade>,
{
    mean(grades.into_iter().map(|g| g.score), mode)
}

/// Unweighted GPA: every course counts once, whatever its credits.
pub fn gpa<'a, I>(grades: I, mode: RoundingMode) -> Hundredths
where
    I: IntoIterator<Item = &'a Grade>,
{
    mean(grades.into_iter().map(|g| grade_points(&g.grade)), mode)
}

pub fn summarize(grades: &[Grade], mode: RoundingMode) -> StudentSummary {
    StudentSummary {
        average_score: average_score(grades, mode),
        gpa: gpa(grades, mode),
        grade_count: grades.len(),
    }
}
