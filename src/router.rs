use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio::sync::Mutex;
use tracing::info;

use crate::command::{Calculation, Command};
use crate::config::FragmentConfig;
use crate::error::{Error, Result};
use crate::executor::{FragmentExecutor, FragmentHandle};
use crate::fragment::{FillArgs, Fragment, Pair};
use crate::storage::{MemoryStorage, StatsSnapshot};

/// Number of columns held by one slice.
pub const SLICE_WIDTH: u64 = 65536;

/// Identifies the fragment holding one slice of one frame of one index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentKey {
    pub index: String,
    pub frame: String,
    pub slice: u64,
}

impl FragmentKey {
    pub fn new(index: impl Into<String>, frame: impl Into<String>, slice: u64) -> Self {
        FragmentKey {
            index: index.into(),
            frame: frame.into(),
            slice,
        }
    }

    /// Key of the slice that owns column `col`.
    pub fn for_column(index: &str, frame: &str, col: u64) -> Self {
        Self::new(index, frame, col / SLICE_WIDTH)
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.index, self.frame, self.slice)
    }
}

/// In-process dispatch: routes commands to per-slice fragment executors,
/// creating in-memory fragments on first access, and merges per-slice results.
#[derive(Clone)]
pub struct ShardRouter {
    config: FragmentConfig,
    fragments: Arc<Mutex<BTreeMap<FragmentKey, FragmentHandle>>>,
}

impl ShardRouter {
    pub fn new(config: FragmentConfig) -> Self {
        ShardRouter {
            config,
            fragments: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Executor for `key`, spawning it on first access.
    pub async fn fragment(&self, key: &FragmentKey) -> FragmentHandle {
        let mut fragments = self.fragments.lock().await;
        if let Some(handle) = fragments.get(key) {
            return handle.clone();
        }
        info!(fragment = %key, "opening fragment");
        let fragment = Fragment::with_config(MemoryStorage::new(), self.config.clone());
        let handle = FragmentExecutor::spawn(key.to_string(), fragment);
        fragments.insert(key.clone(), handle.clone());
        handle
    }

    /// Executors already opened for `(index, frame)`, in slice order.
    pub async fn slices(&self, index: &str, frame: &str) -> Vec<FragmentHandle> {
        self.fragments
            .lock()
            .await
            .iter()
            .filter(|(k, _)| k.index == index && k.frame == frame)
            .map(|(_, h)| h.clone())
            .collect()
    }

    pub async fn fragment_count(&self) -> usize {
        self.fragments.lock().await.len()
    }

    /// Run `command` on the fragment for `key` and unwrap its calculation.
    pub async fn execute(&self, key: &FragmentKey, command: Command) -> Result<Calculation> {
        let handle = self.fragment(key).await;
        into_result(handle.execute(command).await?.answer)
    }

    pub async fn set_bit(
        &self,
        index: &str,
        frame: &str,
        row_id: u64,
        col: u64,
        filter: u64,
    ) -> Result<bool> {
        let key = FragmentKey::for_column(index, frame, col);
        let cmd = Command::SetBit {
            row_id,
            pos: col,
            filter,
        };
        match self.execute(&key, cmd).await? {
            Calculation::Changed(changed) => Ok(changed),
            _ => Err(Error::UnexpectedResult("SetBit")),
        }
    }

    pub async fn clear_bit(&self, index: &str, frame: &str, row_id: u64, col: u64) -> Result<bool> {
        let key = FragmentKey::for_column(index, frame, col);
        match self.execute(&key, Command::ClearBit { row_id, pos: col }).await? {
            Calculation::Changed(changed) => Ok(changed),
            _ => Err(Error::UnexpectedResult("ClearBit")),
        }
    }

    /// Bits set in `row_id` across every opened slice.
    pub async fn count(&self, index: &str, frame: &str, row_id: u64) -> Result<u64> {
        let slices = self.slices(index, frame).await;
        let counts = try_join_all(slices.iter().map(|f| count_row(f, row_id))).await?;
        Ok(counts.into_iter().sum())
    }

    /// Cluster-wide top-N: each slice reports full counts, which are summed
    /// per row before ranking.
    pub async fn top_n(
        &self,
        index: &str,
        frame: &str,
        n: usize,
        categories: &[u64],
    ) -> Result<Vec<Pair>> {
        let slices = self.slices(index, frame).await;
        let per_slice = try_join_all(slices.iter().map(|f| async move {
            let cmd = Command::TopNAll {
                n: usize::MAX,
                categories: categories.to_vec(),
            };
            match into_result(f.execute(cmd).await?.answer)? {
                Calculation::Pairs(pairs) => Ok(pairs),
                _ => Err(Error::UnexpectedResult("TopNAll")),
            }
        }))
        .await?;

        let mut totals: HashMap<u64, u64> = HashMap::new();
        for pair in per_slice.into_iter().flatten() {
            *totals.entry(pair.id).or_default() += pair.count;
        }
        let mut merged: Vec<Pair> = totals
            .into_iter()
            .map(|(id, count)| Pair { id, count })
            .collect();
        merged.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        merged.truncate(n);
        Ok(merged)
    }

    /// Storage counters summed over every fragment.
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        let all: Vec<FragmentHandle> = self.fragments.lock().await.values().cloned().collect();
        let mut total = StatsSnapshot::default();
        for f in all {
            match into_result(f.execute(Command::Stats).await?.answer)? {
                Calculation::Stats(s) => {
                    total.rows += s.rows;
                    total.bits += s.bits;
                    total.buckets += s.buckets;
                    total.bits_set += s.bits_set;
                    total.bits_cleared += s.bits_cleared;
                }
                _ => return Err(Error::UnexpectedResult("Stats")),
            }
        }
        Ok(total)
    }

    /// Close every fragment, waiting for queued work to drain.
    pub async fn shutdown(&self) {
        let drained: Vec<FragmentHandle> = {
            let mut fragments = self.fragments.lock().await;
            std::mem::take(&mut *fragments).into_values().collect()
        };
        for handle in drained {
            handle.shutdown().await;
        }
    }
}

// TopFill allocates no handles, so this never races another caller's end_query.
async fn count_row(fragment: &FragmentHandle, row_id: u64) -> Result<u64> {
    let args = FillArgs {
        handle: None,
        rows: vec![row_id],
    };
    match into_result(fragment.execute(Command::TopFill { args }).await?.answer)? {
        Calculation::Pairs(pairs) => Ok(pairs.first().map_or(0, |p| p.count)),
        _ => Err(Error::UnexpectedResult("TopFill")),
    }
}

fn into_result(calc: Calculation) -> Result<Calculation> {
    match calc {
        Calculation::Error(e) => Err(e),
        other => Ok(other),
    }
}
