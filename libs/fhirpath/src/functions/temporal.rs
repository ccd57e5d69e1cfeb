//! Temporal functions: `now`, `today`, `timeOfDay`.
//!
//! All three read the evaluation instant fixed in the context, so repeated
//! calls within one expression agree with each other.

use chrono::Timelike;

use crate::context::EvalContext;
use crate::value::{
    Collection, Date, DatePrecision, DateTime, DateTimePrecision, Time, TimePrecision, Value,
};

pub fn now(ctx: &EvalContext) -> Collection {
    let instant = ctx.instant();
    Collection::single(Value::DateTime(DateTime {
        date: instant.date_naive(),
        time: instant.time(),
        precision: DateTimePrecision::Millisecond,
        offset: Some(instant.offset().local_minus_utc()),
    }))
}

pub fn today(ctx: &EvalContext) -> Collection {
    Collection::single(Value::Date(Date {
        date: ctx.instant().date_naive(),
        precision: DatePrecision::Day,
    }))
}

pub fn time_of_day(ctx: &EvalContext) -> Collection {
    let time = ctx.instant().time();
    // The context already truncated to milliseconds.
    debug_assert_eq!(time.nanosecond() % 1_000_000, 0);
    Collection::single(Value::Time(Time {
        time,
        precision: TimePrecision::Millisecond,
    }))
}
