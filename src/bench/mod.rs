//! Load generators that drive a [`ShardRouter`] with bit mutations.
//!
//! A benchmark is initialized once with a client and then run by one or more
//! agents. Each run returns a JSON object so composite benchmarks can nest
//! the results of their children.

mod compose;
mod set_bits;

pub use compose::{parallel, serial, Parallel, Serial};
pub use set_bits::{DiagonalSetBits, RandomSetBits};

use clap::Parser;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::router::ShardRouter;

/// Results reported by one benchmark run.
pub type BenchResults = Map<String, Value>;

pub trait Benchmark: Send + Sync {
    /// Attach the client. Called once, before any run.
    fn init(&mut self, router: &ShardRouter) -> Result<()>;

    /// Run as agent `agent`. Agents parameterize ids or seeds so that
    /// concurrent agents do not repeat each other's work.
    fn run(&self, agent: usize) -> BoxFuture<'_, BenchResults>;
}

/// A benchmark configurable from command-line flags.
pub trait BenchCommand: Benchmark {
    /// Parse this benchmark's flags from the front of `args`, returning the
    /// arguments left over for the next benchmark.
    fn consume_flags(&mut self, args: &[String]) -> Result<Vec<String>>;

    /// Human-readable description of the benchmark and its flags.
    fn usage() -> String
    where
        Self: Sized;
}

/// Names accepted by [`parse_chain`] and [`usage`].
pub const BENCHMARKS: &[&str] = &["DiagonalSetBits", "RandomSetBits"];

/// Usage text for the named benchmark.
pub fn usage(name: &str) -> Option<String> {
    match name {
        "DiagonalSetBits" => Some(DiagonalSetBits::usage()),
        "RandomSetBits" => Some(RandomSetBits::usage()),
        _ => None,
    }
}

/// Parse `Name [flags] Name [flags] ...` into configured benchmarks.
pub fn parse_chain(args: &[String]) -> Result<Vec<Box<dyn Benchmark>>> {
    let mut out: Vec<Box<dyn Benchmark>> = Vec::new();
    let mut rest = args.to_vec();
    while let Some((name, flags)) = rest.split_first() {
        let (bench, remaining) = match name.as_str() {
            "DiagonalSetBits" => configure(DiagonalSetBits::default(), flags)?,
            "RandomSetBits" => configure(RandomSetBits::default(), flags)?,
            other => {
                return Err(Error::Config(format!(
                    "unknown benchmark {:?} (expected one of {})",
                    other,
                    BENCHMARKS.join(", ")
                )))
            }
        };
        out.push(bench);
        rest = remaining;
    }
    Ok(out)
}

fn configure<B>(mut bench: B, flags: &[String]) -> Result<(Box<dyn Benchmark>, Vec<String>)>
where
    B: BenchCommand + 'static,
{
    let rest = bench.consume_flags(flags)?;
    let bench: Box<dyn Benchmark> = Box::new(bench);
    Ok((bench, rest))
}

/// Parse `args` as flags for `T`, treating `name` as the program name.
fn parse_flags<T: Parser>(name: &str, args: &[String]) -> Result<T> {
    T::try_parse_from(std::iter::once(name.to_string()).chain(args.iter().cloned()))
        .map_err(|e| Error::Config(format!("{}: {}", name, e)))
}

/// Spread iteration `n` of agent `agent` into a range no other agent touches.
fn agentize(n: u64, iterations: u64, agent: usize) -> u64 {
    n + agent as u64 * iterations
}

fn no_client(bench: &str, agent: usize) -> BenchResults {
    let err = Error::ClientUnavailable(format!("no client set for {} agent {}", bench, agent));
    let mut results = BenchResults::new();
    results.insert("error".into(), Value::String(err.to_string()));
    results
}
