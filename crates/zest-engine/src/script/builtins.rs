//! Text, math and clock helpers behind the utility operators

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use rand::Rng;

use crate::ast::{DateField, MathFn, PadSide};
use crate::value::Value;

/// Unix time of 2000-01-01T00:00:00Z, the zero of `datetime.timestamp`
const TIMESTAMP_EPOCH: i64 = 946_684_800;

pub fn pad(side: PadSide, text: &str, width: f64, fill: Option<&str>) -> String {
    let fill = fill.and_then(|f| f.chars().next()).unwrap_or(' ');
    let width = if width.is_finite() { width.max(0.0) as usize } else { 0 };
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let padding: String = std::iter::repeat(fill).take(width - len).collect();
    match side {
        PadSide::Left => padding + text,
        PadSide::Right => format!("{}{}", text, padding),
    }
}

/// Trig functions take degrees
pub fn math(func: MathFn, x: f64) -> f64 {
    match func {
        MathFn::Sine => x.to_radians().sin(),
        MathFn::Cosine => x.to_radians().cos(),
        MathFn::Tangent => x.to_radians().tan(),
        MathFn::Floor => x.floor(),
        MathFn::Ceil => x.ceil(),
        MathFn::Round => x.round(),
    }
}

/// Integer in `[min(a, b), max(a, b)]`, both ends inclusive. A range with
/// no integer inside gives the floor of its lower end.
pub fn random(rng: &mut impl Rng, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let (first, last) = (lo.ceil() as i64, hi.floor() as i64);
    if first > last {
        return lo.floor();
    }
    if first == last {
        return first as f64;
    }
    rng.gen_range(first..=last) as f64
}

pub fn datetime_at<Tz: TimeZone>(field: DateField, now: DateTime<Tz>) -> Value {
    let hour = now.hour();
    match field {
        DateField::Year => Value::from(now.year()),
        DateField::Month => Value::Number(now.month() as f64),
        DateField::Day => Value::Number(now.day() as f64),
        DateField::Weekday => Value::Number(now.weekday().num_days_from_sunday() as f64),
        DateField::Hour => Value::Number(hour as f64),
        DateField::Hour12 => Value::Number(match hour % 12 {
            0 => 12.0,
            h => h as f64,
        }),
        DateField::Minute => Value::Number(now.minute() as f64),
        DateField::Second => Value::Number(now.second() as f64),
        DateField::Millisecond => Value::Number(now.timestamp_subsec_millis() as f64),
        DateField::AmPm => Value::from(if hour < 12 { "am" } else { "pm" }),
        DateField::Timestamp => Value::Number((now.timestamp() - TIMESTAMP_EPOCH) as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn padding() {
        assert_eq!(pad(PadSide::Left, "7", 3.0, Some("0")), "007");
        assert_eq!(pad(PadSide::Right, "ab", 4.0, None), "ab  ");
        assert_eq!(pad(PadSide::Left, "long", 2.0, None), "long");
    }

    #[test]
    fn random_is_inclusive_and_order_independent() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let n = random(&mut rng, 3.0, 1.0);
            assert!((1.0..=3.0).contains(&n));
            seen[n as usize - 1] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(random(&mut rng, 5.0, 5.0), 5.0);
    }

    #[test]
    fn random_without_an_integer_inside_stays_at_the_floor() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(random(&mut rng, 1.5, 1.7), 1.0);
        assert_eq!(random(&mut rng, 1.7, 1.5), 1.0);
        assert_eq!(random(&mut rng, 1.5, 2.0), 2.0);
    }

    #[test]
    fn trig_in_degrees() {
        assert!((math(MathFn::Sine, 90.0) - 1.0).abs() < 1e-9);
        assert!(math(MathFn::Cosine, 90.0).abs() < 1e-9);
        assert_eq!(math(MathFn::Round, 2.5), 3.0);
        assert_eq!(math(MathFn::Floor, -0.5), -1.0);
    }

    #[test]
    fn datetime_fields() {
        let at = Utc.with_ymd_and_hms(2001, 1, 1, 13, 5, 9).single().unwrap();
        assert_eq!(datetime_at(DateField::Year, at), Value::from(2001));
        assert_eq!(datetime_at(DateField::Hour12, at), Value::from(1));
        assert_eq!(datetime_at(DateField::AmPm, at), Value::from("pm"));
        // 2001-01-01 was a Monday
        assert_eq!(datetime_at(DateField::Weekday, at), Value::from(1));
        assert_eq!(
            datetime_at(DateField::Timestamp, at),
            Value::Number((366 * 86_400 + 13 * 3600 + 5 * 60 + 9) as f64)
        );
    }
}
