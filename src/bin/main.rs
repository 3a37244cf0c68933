use std::path::PathBuf;

use bitshard::bench::{self, Benchmark};
use bitshard::{FragmentConfig, HandleRetention, ShardRouter};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::{Map, Value};

/// Tools for exercising the bitmap shard engine.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more benchmarks against in-process fragments and print JSON results
    Bench {
        /// JSON fragment configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Override the handle retention policy
        #[arg(long, value_enum)]
        handle_retention: Option<HandleRetention>,
        /// Number of concurrent agents
        #[arg(short, long, default_value_t = 1)]
        agents: usize,
        /// Run the listed benchmarks concurrently instead of in sequence
        #[arg(long)]
        parallel: bool,
        /// Benchmarks and their flags, e.g. `DiagonalSetBits --iterations 10 RandomSetBits --seed 7`
        #[arg(
            value_name = "BENCHMARK",
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        benchmarks: Vec<String>,
    },
    /// Print the flags accepted by a benchmark
    Usage {
        /// Benchmark name; omit to list all benchmarks
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench {
            config,
            handle_retention,
            agents,
            parallel,
            benchmarks,
        } => {
            let mut cfg = match config {
                Some(path) => FragmentConfig::from_json_file(path)?,
                None => FragmentConfig::default(),
            };
            if let Some(retention) = handle_retention {
                cfg.handle_retention = retention;
            }

            let chain = bench::parse_chain(&benchmarks)?;
            let mut root: Box<dyn Benchmark> = if parallel {
                Box::new(bench::parallel(chain))
            } else {
                Box::new(bench::serial(chain))
            };

            let router = ShardRouter::new(cfg);
            root.init(&router)?;
            let runs = join_all((0..agents.max(1)).map(|agent| root.run(agent))).await;

            let mut report = Map::new();
            for (agent, results) in runs.into_iter().enumerate() {
                report.insert(format!("agent_{}", agent), Value::Object(results));
            }
            report.insert("stats".into(), serde_json::to_value(router.stats().await?)?);
            report.insert(
                "fragments".into(),
                Value::from(router.fragment_count().await),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            router.shutdown().await;
        }
        Commands::Usage { name } => match name {
            Some(name) => match bench::usage(&name) {
                Some(text) => println!("{}", text),
                None => {
                    eprintln!("unknown benchmark {:?}", name);
                    std::process::exit(2);
                }
            },
            None => {
                for name in bench::BENCHMARKS {
                    println!("{}", name);
                }
            }
        },
    }
    Ok(())
}
