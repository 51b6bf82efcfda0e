//! Shared helpers for the integration tests.

#![allow(dead_code)]

use declaratest::output::BufferPrinter;
use declaratest::store::MemoryStore;
use declaratest::{ExecutionContext, Outcome, Tester, TesterConfig, TesterError, Value};
use serde_json::json;

/// Where fixtures are stored inside a `MemoryStore`.
pub const DOCUMENT: &str = "tests/fixtures/arith.rs";

pub fn sum_args(args: &[Value], _: &ExecutionContext) -> Result<Outcome, TesterError> {
    Ok(Outcome::value(json!(args.iter().filter_map(Value::as_i64).sum::<i64>())))
}

pub fn double(args: &[Value], _: &ExecutionContext) -> Result<Outcome, TesterError> {
    let doubled = args
        .first()
        .and_then(Value::as_i64)
        .map_or(Value::Null, |n| json!(n * 2));
    Ok(Outcome::value(doubled))
}

/// A generator yielding `1..=n`.
pub fn count_up(args: &[Value], _: &ExecutionContext) -> Result<Outcome, TesterError> {
    let limit = args.first().and_then(Value::as_u64).unwrap_or(0);
    Ok(Outcome::yields(move |step| {
        let next = step as u64 + 1;
        Ok((next <= limit).then(|| json!(next)))
    }))
}

/// A tester printing into a buffer, fixing through an in-memory store.
pub fn tester_with(config: TesterConfig, store: MemoryStore) -> (Tester, BufferPrinter) {
    let printer = BufferPrinter::new();
    let tester = Tester::with_store(config, Box::new(store))
        .expect("valid configuration")
        .with_printer(Box::new(printer.clone()));
    (tester, printer)
}

pub fn tester(config: TesterConfig) -> (Tester, BufferPrinter) {
    tester_with(config, MemoryStore::new())
}
