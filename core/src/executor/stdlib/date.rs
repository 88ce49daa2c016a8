//! `Date` over `chrono`
//!
//! A date is a millisecond timestamp (UTC, `NaN` when invalid). The runtime
//! has no local timezone: local getters and formatting use UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::rc::Rc;

use super::{arg, constructor, method, this_object, Member};
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::ops::{to_number_lossy, to_string};
use crate::executor::types::{Brand, NativeImpl, Obj, ObjectKind, TypeTag, Value};

pub static MEMBERS: &[Member] = &[
    method("getTime", 0, get_time),
    method("valueOf", 0, get_time),
    method("getFullYear", 0, get_full_year),
    method("getMonth", 0, get_month),
    method("getDate", 0, get_date),
    method("getDay", 0, get_day),
    method("getHours", 0, get_hours),
    method("getMinutes", 0, get_minutes),
    method("getSeconds", 0, get_seconds),
    method("getMilliseconds", 0, get_milliseconds),
    method("getUTCFullYear", 0, get_full_year),
    method("getUTCMonth", 0, get_month),
    method("getUTCDate", 0, get_date),
    method("getUTCDay", 0, get_day),
    method("getUTCHours", 0, get_hours),
    method("getUTCMinutes", 0, get_minutes),
    method("getUTCSeconds", 0, get_seconds),
    method("getUTCMilliseconds", 0, get_milliseconds),
    method("getTimezoneOffset", 0, get_timezone_offset),
    method("setTime", 1, set_time),
    method("toISOString", 0, to_iso_string_member),
    method("toJSON", 0, to_json),
    method("toString", 0, to_string_member),
    method("toUTCString", 0, to_utc_string),
];

static STATICS: &[Member] = &[
    method("now", 0, now),
    method("parse", 1, parse),
    method("UTC", 7, utc),
];

const MAX_TIME: f64 = 8.64e15;

pub fn constructor_object() -> Obj {
    constructor(
        "Date",
        7,
        NativeImpl::Sync(call_date),
        NativeImpl::Sync(construct),
        Brand::Date,
        STATICS,
    )
}

/* ===================== Conversion ===================== */

fn datetime(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > MAX_TIME {
        f64::NAN
    } else {
        ms.trunc()
    }
}

/// `toISOString` format; `None` for an invalid date
pub fn to_iso_string(ms: f64) -> Option<String> {
    datetime(ms).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// `String(date)` format
pub fn to_display_string(ms: f64) -> String {
    match datetime(ms) {
        Some(dt) => dt
            .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            .to_string(),
        None => "Invalid Date".to_string(),
    }
}

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Timestamp for an ISO 8601 or RFC 2822 string
pub fn parse_date(s: &str) -> f64 {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_millis() as f64;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.timestamp_millis() as f64;
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return naive.and_utc().timestamp_millis() as f64;
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map_or(f64::NAN, |d| d.and_utc().timestamp_millis() as f64);
    }
    f64::NAN
}

/// Timestamp from `(year, month, day, hours, minutes, seconds, ms)`;
/// out-of-range fields carry over like in `Date.UTC`
fn from_components(args: &[Value]) -> f64 {
    let field = |i: usize, default: f64| match args.get(i) {
        Some(v) => to_number_lossy(v),
        None => default,
    };
    let fields = [
        field(0, f64::NAN),
        field(1, 0.0),
        field(2, 1.0),
        field(3, 0.0),
        field(4, 0.0),
        field(5, 0.0),
        field(6, 0.0),
    ];
    if fields.iter().any(|f| !f.is_finite()) {
        return f64::NAN;
    }
    let [year, month, day, hours, minutes, seconds, millis] = fields.map(f64::trunc);
    let year = if (0.0..=99.0).contains(&year) { 1900.0 + year } else { year };
    let total_months = year * 12.0 + month;
    let (year, month) = (total_months.div_euclid(12.0), total_months.rem_euclid(12.0));
    let Some(first) = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1) else {
        return f64::NAN;
    };
    let Some(midnight) = first.and_hms_opt(0, 0, 0) else {
        return f64::NAN;
    };
    let base = midnight.and_utc().timestamp_millis() as f64;
    time_clip(
        base + (day - 1.0) * 86_400_000.0 + hours * 3_600_000.0 + minutes * 60_000.0
            + seconds * 1000.0
            + millis,
    )
}

fn date_object(ms: f64) -> Value {
    Obj::new(ObjectKind::Date(time_clip(ms))).into()
}

/* ===================== Constructor ===================== */

fn call_date(_: &Rc<ExecContext>, _: &Value, _: &[Value]) -> Exec<Value> {
    Ok(to_display_string(now_ms()).into())
}

fn construct(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    let ms = match args {
        [] => now_ms(),
        [Value::Object(obj)] => match &obj.borrow().kind {
            ObjectKind::Date(ms) => *ms,
            _ => parse_date(&to_string(&args[0])),
        },
        [Value::String(s)] => parse_date(s),
        [single] => to_number_lossy(single),
        many => from_components(many),
    };
    Ok(date_object(ms))
}

fn now(_: &Rc<ExecContext>, _: &Value, _: &[Value]) -> Exec<Value> {
    Ok(now_ms().into())
}

fn parse(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(parse_date(&to_string(&arg(args, 0))).into())
}

fn utc(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(from_components(args).into())
}

/* ===================== Members ===================== */

fn this_ms(this: &Value, name: &str) -> Exec<f64> {
    let obj = this_object(this, TypeTag::Date, name)?;
    match &obj.borrow().kind {
        ObjectKind::Date(ms) => Ok(*ms),
        _ => Err(ExecError::type_error("this is not a Date object.")),
    }
}

/// Field of a valid date, `NaN` for an invalid one
fn field(this: &Value, name: &str, f: impl Fn(DateTime<Utc>) -> f64) -> Exec<Value> {
    Ok(datetime(this_ms(this, name)?).map_or(f64::NAN, f).into())
}

fn get_time(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(this_ms(this, "getTime")?.into())
}

fn get_full_year(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getFullYear", |dt| f64::from(dt.year()))
}

fn get_month(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getMonth", |dt| f64::from(dt.month0()))
}

fn get_date(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getDate", |dt| f64::from(dt.day()))
}

fn get_day(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getDay", |dt| f64::from(dt.weekday().num_days_from_sunday()))
}

fn get_hours(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getHours", |dt| f64::from(dt.hour()))
}

fn get_minutes(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getMinutes", |dt| f64::from(dt.minute()))
}

fn get_seconds(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getSeconds", |dt| f64::from(dt.second()))
}

fn get_milliseconds(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getMilliseconds", |dt| f64::from(dt.timestamp_subsec_millis()))
}

fn get_timezone_offset(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    field(this, "getTimezoneOffset", |_| 0.0)
}

fn set_time(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let obj = this_object(this, TypeTag::Date, "setTime")?;
    if obj.borrow().is_frozen() {
        return Err(ExecError::type_error("Cannot modify a frozen Date"));
    }
    let ms = time_clip(to_number_lossy(&arg(args, 0)));
    obj.borrow_mut().kind = ObjectKind::Date(ms);
    Ok(ms.into())
}

fn to_iso_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    to_iso_string(this_ms(this, "toISOString")?)
        .map(Value::from)
        .ok_or_else(|| ExecError::range_error("Invalid time value"))
}

fn to_json(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(to_iso_string(this_ms(this, "toJSON")?).map_or(Value::Null, Value::from))
}

fn to_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(to_display_string(this_ms(this, "toString")?).into())
}

fn to_utc_string(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(match datetime(this_ms(this, "toUTCString")?) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => "Invalid Date".to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_round_trip() {
        let ms = parse_date("2024-01-02T10:20:30.456Z");
        assert_eq!(to_iso_string(ms).as_deref(), Some("2024-01-02T10:20:30.456Z"));
        assert_eq!(parse_date("2024-01-02"), 1_704_153_600_000.0);
        assert!(parse_date("yesterday").is_nan());
        assert_eq!(to_iso_string(f64::NAN), None);
    }

    #[test]
    fn test_components_carry_over() {
        let args = [Value::from(2023), Value::from(12), Value::from(1)];
        assert_eq!(from_components(&args), parse_date("2024-01-01"));
        let args = [Value::from(2024), Value::from(0), Value::from(0)];
        assert_eq!(from_components(&args), parse_date("2023-12-31"));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(
            to_display_string(0.0),
            "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)"
        );
        assert_eq!(to_display_string(f64::NAN), "Invalid Date");
    }
}
