//! Dispatcher contracts: full coverage, exclusive claims, barrier ordering

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use zenwave::pool::{JobKind, PoolJob, WorkerPool, WorkerScratch};
use zenwave::Result;

struct XorJob {
    xor: AtomicU64,
    count: usize,
}

impl PoolJob for XorJob {
    fn kind(&self) -> JobKind {
        JobKind::Output
    }
    fn work_count(&self) -> usize {
        self.count
    }
    fn run_item(&self, _: usize, index: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
        self.xor.fetch_xor(index as u64, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn eight_workers_claim_one_thousand_items_exactly_once() {
    let pool = WorkerPool::new(8, false);
    let job = Arc::new(XorJob {
        xor: AtomicU64::new(0),
        count: 1000,
    });
    pool.run(job.clone()).unwrap();
    // xor of 0..1000 is 0; any duplicate or missing claim leaves residue
    assert_eq!(job.xor.load(Ordering::SeqCst), 0);
}

struct PoisonJob {
    cells: Vec<AtomicU8>,
}

impl PoolJob for PoisonJob {
    fn kind(&self) -> JobKind {
        JobKind::Output
    }
    fn work_count(&self) -> usize {
        self.cells.len()
    }
    fn run_item(&self, _: usize, index: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
        // a poison byte per item: a second visit would be visible
        let prev = self.cells[index].fetch_add(1, Ordering::SeqCst);
        assert_eq!(prev, 0, "item {index} claimed twice");
        Ok(())
    }
}

#[test]
fn sequential_jobs_never_overlap() {
    let pool = WorkerPool::new(6, false);
    for _ in 0..8 {
        let job = Arc::new(PoisonJob {
            cells: (0..257).map(|_| AtomicU8::new(0)).collect(),
        });
        pool.run(job.clone()).unwrap();
        for (i, cell) in job.cells.iter().enumerate() {
            assert_eq!(cell.load(Ordering::SeqCst), 1, "item {i}");
        }
    }
}

struct BarrierCounter {
    counter: AtomicUsize,
    count: usize,
}

impl PoolJob for BarrierCounter {
    fn kind(&self) -> JobKind {
        JobKind::Histogram
    }
    fn work_count(&self) -> usize {
        self.count
    }
    fn run_item(&self, _: usize, _: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn barrier_observes_every_increment() {
    let pool = WorkerPool::new(4, false);
    let job = Arc::new(BarrierCounter {
        counter: AtomicUsize::new(0),
        count: 333,
    });
    pool.run(job.clone()).unwrap();
    assert_eq!(job.counter.load(Ordering::SeqCst), 333);
}
