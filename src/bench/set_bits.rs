use clap::{CommandFactory, Parser};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::warn;

use super::{agentize, no_client, parse_flags, BenchCommand, BenchResults, Benchmark};
use crate::error::{Error, Result};
use crate::router::ShardRouter;

/// Sets bits with increasing profile id and bitmap id.
#[derive(Parser, Clone)]
#[command(name = "DiagonalSetBits", about = "Sets bits with increasing profile id and bitmap id.")]
pub struct DiagonalSetBits {
    /// Bits being set will all be at or above this bitmap id
    #[arg(long, default_value_t = 0)]
    pub base_bitmap_id: u64,
    /// Profile id to start from
    #[arg(long, default_value_t = 0)]
    pub base_profile_id: u64,
    /// Number of bits to set
    #[arg(long, default_value_t = 100)]
    pub iterations: u64,
    /// Index to write to
    #[arg(long, default_value = "benchdb")]
    pub db: String,
    /// Frame to write to
    #[arg(long, default_value = "frame.n")]
    pub frame: String,
    #[arg(skip)]
    client: Option<ShardRouter>,
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

impl Default for DiagonalSetBits {
    fn default() -> Self {
        DiagonalSetBits {
            base_bitmap_id: 0,
            base_profile_id: 0,
            iterations: 100,
            db: "benchdb".into(),
            frame: "frame.n".into(),
            client: None,
            rest: Vec::new(),
        }
    }
}

impl Benchmark for DiagonalSetBits {
    fn init(&mut self, router: &ShardRouter) -> Result<()> {
        if self.db.is_empty() {
            self.db = "DiagonalSetBits".into();
        }
        self.client = Some(router.clone());
        Ok(())
    }

    fn run(&self, agent: usize) -> BoxFuture<'_, BenchResults> {
        async move {
            let Some(client) = &self.client else {
                return no_client("DiagonalSetBits", agent);
            };
            let (mut changed, mut errors) = (0u64, 0u64);
            for n in 0..self.iterations {
                let k = agentize(n, self.iterations, agent);
                let (row, col) = (self.base_bitmap_id + k, self.base_profile_id + k);
                match client.set_bit(&self.db, &self.frame, row, col, 0).await {
                    Ok(true) => changed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        errors += 1;
                        warn!(agent, row, col, error = %e, "set bit failed");
                    }
                }
            }
            let mut results = BenchResults::new();
            results.insert("bits_changed".into(), Value::from(changed));
            results.insert("errors".into(), Value::from(errors));
            results
        }
        .boxed()
    }
}

impl BenchCommand for DiagonalSetBits {
    fn consume_flags(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut parsed: DiagonalSetBits = parse_flags("DiagonalSetBits", args)?;
        parsed.client = self.client.take();
        let rest = std::mem::take(&mut parsed.rest);
        *self = parsed;
        Ok(rest)
    }

    fn usage() -> String {
        Self::command().render_long_help().to_string()
    }
}

/// Sets random bits, deterministically for a given seed and agent.
#[derive(Parser, Clone)]
#[command(name = "RandomSetBits", about = "Sets random bits.")]
pub struct RandomSetBits {
    /// Bitmap id to start from
    #[arg(long, default_value_t = 0)]
    pub base_bitmap_id: u64,
    /// Number of possible bitmap ids that can be set
    #[arg(long, default_value_t = 100_000)]
    pub bitmap_id_range: u64,
    /// Profile id to start from
    #[arg(long, default_value_t = 0)]
    pub base_profile_id: u64,
    /// Number of possible profile ids that can be set
    #[arg(long, default_value_t = 100_000)]
    pub profile_id_range: u64,
    /// Number of bits to set
    #[arg(long, default_value_t = 100)]
    pub iterations: u64,
    /// Seed for the RNG; each agent adds its number
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    /// Index to write to
    #[arg(long, default_value = "benchdb")]
    pub db: String,
    /// Frame to write to
    #[arg(long, default_value = "frame.n")]
    pub frame: String,
    #[arg(skip)]
    client: Option<ShardRouter>,
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

impl Default for RandomSetBits {
    fn default() -> Self {
        RandomSetBits {
            base_bitmap_id: 0,
            bitmap_id_range: 100_000,
            base_profile_id: 0,
            profile_id_range: 100_000,
            iterations: 100,
            seed: 1,
            db: "benchdb".into(),
            frame: "frame.n".into(),
            client: None,
            rest: Vec::new(),
        }
    }
}

impl Benchmark for RandomSetBits {
    fn init(&mut self, router: &ShardRouter) -> Result<()> {
        if self.bitmap_id_range == 0 || self.profile_id_range == 0 {
            return Err(Error::Config(
                "RandomSetBits: id ranges must be non-zero".into(),
            ));
        }
        if self.db.is_empty() {
            self.db = "RandomSetBits".into();
        }
        self.client = Some(router.clone());
        Ok(())
    }

    fn run(&self, agent: usize) -> BoxFuture<'_, BenchResults> {
        async move {
            let Some(client) = &self.client else {
                return no_client("RandomSetBits", agent);
            };
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(agent as u64));
            let (mut changed, mut errors) = (0u64, 0u64);
            for _ in 0..self.iterations {
                let row = self.base_bitmap_id + rng.gen_range(0..self.bitmap_id_range);
                let col = self.base_profile_id + rng.gen_range(0..self.profile_id_range);
                match client.set_bit(&self.db, &self.frame, row, col, 0).await {
                    Ok(true) => changed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        errors += 1;
                        warn!(agent, row, col, error = %e, "set bit failed");
                    }
                }
            }
            let mut results = BenchResults::new();
            results.insert("bits_changed".into(), Value::from(changed));
            results.insert("errors".into(), Value::from(errors));
            results
        }
        .boxed()
    }
}

impl BenchCommand for RandomSetBits {
    fn consume_flags(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut parsed: RandomSetBits = parse_flags("RandomSetBits", args)?;
        parsed.client = self.client.take();
        let rest = std::mem::take(&mut parsed.rest);
        *self = parsed;
        Ok(rest)
    }

    fn usage() -> String {
        Self::command().render_long_help().to_string()
    }
}
