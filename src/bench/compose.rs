use std::time::Instant;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;

use super::{BenchResults, Benchmark};
use crate::error::{Error, Result};
use crate::router::ShardRouter;

/// Runs its children concurrently; results are keyed by child index.
pub struct Parallel {
    benchmarks: Vec<Box<dyn Benchmark>>,
}

/// Runs its children one after another and reports each child's runtime.
pub struct Serial {
    benchmarks: Vec<Box<dyn Benchmark>>,
}

pub fn parallel(benchmarks: Vec<Box<dyn Benchmark>>) -> Parallel {
    Parallel { benchmarks }
}

pub fn serial(benchmarks: Vec<Box<dyn Benchmark>>) -> Serial {
    Serial { benchmarks }
}

fn init_all(kind: &str, benchmarks: &mut [Box<dyn Benchmark>], router: &ShardRouter) -> Result<()> {
    let failures: Vec<String> = benchmarks
        .iter_mut()
        .enumerate()
        .filter_map(|(i, b)| b.init(router).err().map(|e| format!("{}: {}", i, e)))
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::ClientUnavailable(format!(
            "{} init failed: [{}]",
            kind,
            failures.join("; ")
        )))
    }
}

impl Benchmark for Parallel {
    fn init(&mut self, router: &ShardRouter) -> Result<()> {
        init_all("parallel", &mut self.benchmarks, router)
    }

    fn run(&self, agent: usize) -> BoxFuture<'_, BenchResults> {
        async move {
            let runs = join_all(self.benchmarks.iter().map(|b| b.run(agent))).await;
            runs.into_iter()
                .enumerate()
                .map(|(i, r)| (i.to_string(), Value::Object(r)))
                .collect()
        }
        .boxed()
    }
}

impl Benchmark for Serial {
    fn init(&mut self, router: &ShardRouter) -> Result<()> {
        init_all("serial", &mut self.benchmarks, router)
    }

    fn run(&self, agent: usize) -> BoxFuture<'_, BenchResults> {
        async move {
            let mut results = BenchResults::new();
            let mut runtimes = BenchResults::new();
            for (i, b) in self.benchmarks.iter().enumerate() {
                let start = Instant::now();
                let ret = b.run(agent).await;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                results.insert(i.to_string(), Value::Object(ret));
                runtimes.insert(i.to_string(), Value::from(elapsed_ms));
            }
            results.insert("runtimes".into(), Value::Object(runtimes));
            results
        }
        .boxed()
    }
}
