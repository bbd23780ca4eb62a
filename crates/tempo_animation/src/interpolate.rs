//! Value interpolation
//!
//! Numbers interpolate linearly. Strings are split into alternating literal
//! and numeric runs; the numeric runs of the end value are paired by index
//! with those of the start value and interpolated one by one, while the
//! literal runs come verbatim from the end value.

use std::sync::OnceLock;

use regex::Regex;
use tempo_core::PropertyValue;

/// Numbers embedded in strings: `10`, `-2.5`, `.5`, `1e3`
fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("Invalid regex pattern")
    })
}

/// Split a string into literal runs and the numbers between them
///
/// The returned literals always number one more than the numbers.
pub fn split_numbers(text: &str) -> (Vec<String>, Vec<f64>) {
    let mut literals = Vec::new();
    let mut numbers = Vec::new();
    let mut last = 0;

    for found in number_pattern().find_iter(text) {
        let Ok(number) = found.as_str().parse::<f64>() else {
            continue;
        };
        literals.push(text[last..found.start()].to_string());
        numbers.push(number);
        last = found.end();
    }
    literals.push(text[last..].to_string());

    (literals, numbers)
}

/// Operator of a relative end value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelativeOp {
    Add,
    Sub,
    Mul,
}

impl RelativeOp {
    pub fn apply(self, base: f64, amount: f64) -> f64 {
        match self {
            RelativeOp::Add => base + amount,
            RelativeOp::Sub => base - amount,
            RelativeOp::Mul => base * amount,
        }
    }
}

/// End (or start) value given to a tween
#[derive(Clone, Debug, PartialEq)]
pub enum TweenValue {
    Number(f64),
    /// `"+=10"`, `"-=10"`, `"*=2"`, applied to the current value
    Relative(RelativeOp, f64),
    Text(String),
}

impl TweenValue {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let relative = [
            ("+=", RelativeOp::Add),
            ("-=", RelativeOp::Sub),
            ("*=", RelativeOp::Mul),
        ];
        for (prefix, op) in relative {
            if let Some(amount) = trimmed
                .strip_prefix(prefix)
                .and_then(|rest| rest.trim().parse::<f64>().ok())
            {
                return TweenValue::Relative(op, amount);
            }
        }
        match trimmed.parse::<f64>() {
            Ok(n) => TweenValue::Number(n),
            Err(_) => TweenValue::Text(text.to_string()),
        }
    }

    /// Turn into an absolute value given the property's current value
    ///
    /// A relative value applied to a string with a unit (`"10px"`) keeps the
    /// unit and changes the first number.
    pub fn resolve(&self, current: Option<&PropertyValue>) -> PropertyValue {
        match self {
            TweenValue::Number(n) => PropertyValue::Number(*n),
            TweenValue::Text(s) => PropertyValue::Text(s.clone()),
            TweenValue::Relative(op, amount) => match current {
                Some(PropertyValue::Text(text)) if text.trim().parse::<f64>().is_err() => {
                    let (literals, mut numbers) = split_numbers(text);
                    match numbers.first_mut() {
                        Some(first) => {
                            *first = op.apply(*first, *amount);
                            PropertyValue::Text(join(&literals, &numbers, &[]))
                        }
                        None => PropertyValue::Number(op.apply(0.0, *amount)),
                    }
                }
                other => {
                    let base = other.and_then(|v| v.as_number()).unwrap_or(0.0);
                    PropertyValue::Number(op.apply(base, *amount))
                }
            },
        }
    }
}

impl From<f64> for TweenValue {
    fn from(value: f64) -> Self {
        TweenValue::Number(value)
    }
}

impl From<i32> for TweenValue {
    fn from(value: i32) -> Self {
        TweenValue::Number(value as f64)
    }
}

impl From<&str> for TweenValue {
    fn from(value: &str) -> Self {
        TweenValue::parse(value)
    }
}

impl From<String> for TweenValue {
    fn from(value: String) -> Self {
        TweenValue::parse(&value)
    }
}

impl From<PropertyValue> for TweenValue {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Number(n) => TweenValue::Number(n),
            PropertyValue::Text(s) => TweenValue::parse(&s),
        }
    }
}

/// Round to 4 decimal places, the precision written into strings
fn round_for_text(value: f64) -> f64 {
    let rounded = (value * 10000.0).round() / 10000.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn join(literals: &[String], numbers: &[f64], integer: &[bool]) -> String {
    let capacity = literals.iter().map(String::len).sum::<usize>() + 8 * numbers.len();
    let mut out = String::with_capacity(capacity);
    for (i, literal) in literals.iter().enumerate() {
        out.push_str(literal);
        if let Some(&n) = numbers.get(i) {
            let n = if integer.get(i).copied().unwrap_or(false) {
                n.round()
            } else {
                round_for_text(n)
            };
            out.push_str(&n.to_string());
        }
    }
    out
}

/// Segmented interpolation between two strings
#[derive(Clone, Debug, PartialEq)]
pub struct StringInterpolator {
    start: String,
    end: String,
    literals: Vec<String>,
    starts: Vec<f64>,
    changes: Vec<f64>,
    /// Channels written as integers (the first three numbers of `rgb(`/`rgba(`)
    integer: Vec<bool>,
}

impl StringInterpolator {
    pub fn new(start: &str, end: &str) -> Self {
        let (_, start_numbers) = split_numbers(start);
        let (literals, end_numbers) = split_numbers(end);

        let starts: Vec<f64> = (0..end_numbers.len())
            .map(|i| start_numbers.get(i).copied().unwrap_or(0.0))
            .collect();
        let changes = end_numbers
            .iter()
            .zip(&starts)
            .map(|(end, start)| end - start)
            .collect();

        let mut integer = Vec::with_capacity(end_numbers.len());
        let mut color_channels: i32 = 0;
        for literal in literals.iter().take(end_numbers.len()) {
            let lower = literal.to_ascii_lowercase();
            if lower.contains("rgb(") || lower.contains("rgba(") {
                color_channels = 3;
            }
            integer.push(color_channels > 0);
            color_channels = (color_channels - 1).max(0);
        }

        Self {
            start: start.to_string(),
            end: end.to_string(),
            literals,
            starts,
            changes,
            integer,
        }
    }

    /// Whether any numeric run is interpolated
    pub fn has_numbers(&self) -> bool {
        !self.starts.is_empty()
    }

    /// The string at `ratio`
    ///
    /// Ratio 0 is the start string and ratio 1 the end string, exactly.
    /// Strings without numbers hold the start value until the ratio reaches 1.
    pub fn at(&self, ratio: f64) -> String {
        if ratio == 1.0 {
            return self.end.clone();
        }
        if ratio == 0.0 || !self.has_numbers() {
            return self.start.clone();
        }
        let numbers: Vec<f64> = self
            .starts
            .iter()
            .zip(&self.changes)
            .map(|(s, c)| s + c * ratio)
            .collect();
        join(&self.literals, &numbers, &self.integer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_numbers() {
        let (literals, numbers) = split_numbers("translate(10px, -2.5em) scale(.5)");
        assert_eq!(numbers, vec![10.0, -2.5, 0.5]);
        assert_eq!(literals, vec!["translate(", "px, ", "em) scale(", ")"]);
    }

    #[test]
    fn test_units_interpolate_and_literals_survive() {
        let interp = StringInterpolator::new("1px", "10px");
        assert_eq!(interp.at(0.5), "5.5px");
        assert_eq!(interp.at(0.0), "1px");
        assert_eq!(interp.at(1.0), "10px");
    }

    #[test]
    fn test_literal_only_string_is_unchanged() {
        let interp = StringInterpolator::new("a", "a");
        assert!(!interp.has_numbers());
        assert_eq!(interp.at(0.3), "a");
    }

    #[test]
    fn test_discrete_switch() {
        let interp = StringInterpolator::new("left", "right");
        assert_eq!(interp.at(0.0), "left");
        assert_eq!(interp.at(0.99), "left");
        assert_eq!(interp.at(1.0), "right");
    }

    #[test]
    fn test_rgb_channels_are_integers() {
        let interp = StringInterpolator::new("rgba(0, 0, 0, 0)", "rgba(255, 100, 1, 1)");
        assert_eq!(interp.at(0.5), "rgba(128, 50, 1, 0.5)");
    }

    #[test]
    fn test_missing_start_numbers_count_as_zero() {
        let interp = StringInterpolator::new("none", "blur(10px)");
        assert_eq!(interp.at(0.25), "blur(2.5px)");
    }

    #[test]
    fn test_rounding_to_four_places() {
        let interp = StringInterpolator::new("0px", "1px");
        assert_eq!(interp.at(1.0 / 3.0), "0.3333px");
    }

    #[test]
    fn test_parse_tween_values() {
        assert_eq!(TweenValue::parse("+=10"), TweenValue::Relative(RelativeOp::Add, 10.0));
        assert_eq!(TweenValue::parse("-= 2"), TweenValue::Relative(RelativeOp::Sub, 2.0));
        assert_eq!(TweenValue::parse("*=3"), TweenValue::Relative(RelativeOp::Mul, 3.0));
        assert_eq!(TweenValue::parse(" 42 "), TweenValue::Number(42.0));
        assert_eq!(TweenValue::parse("10px"), TweenValue::Text("10px".into()));
    }

    #[test]
    fn test_resolve_relative() {
        let add = TweenValue::parse("+=5");
        assert_eq!(
            add.resolve(Some(&PropertyValue::Number(10.0))),
            PropertyValue::Number(15.0)
        );
        assert_eq!(add.resolve(None), PropertyValue::Number(5.0));
        assert_eq!(
            add.resolve(Some(&PropertyValue::from("10px"))),
            PropertyValue::from("15px")
        );
        assert_eq!(
            TweenValue::parse("*=2").resolve(Some(&PropertyValue::from("4"))),
            PropertyValue::Number(8.0)
        );
    }
}
