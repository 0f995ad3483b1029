//! The worker-thread dispatcher
//!
//! A fixed pool of OS threads, each parked on a channel until the main
//! thread posts `Start`. The job lives in a mailbox written under the
//! dispatcher lock before the broadcast; workers claim indices with an
//! atomic increment, run items without holding any lock, and the last
//! worker out trips the done barrier. Jobs may be staged into dependency
//! levels: no item of level `n` starts before every item of level `n-1`
//! completed.
//!
//! There is no cancellation and no work stealing; a failing item records
//! the first error, remaining claims drain without running, and the main
//! thread observes the error after the barrier.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};
use log::{debug, warn};
use whereat::at;

use crate::error::{Error, Result};
use crate::pack::PackScratch;

/// Most dependency levels any job uses (the Bayer path needs four)
pub const MAX_JOB_LEVELS: usize = 4;

/// The closed set of work the pool executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Assemble + correct + pack one scanline
    Output,
    /// Repack an already-decoded uncompressed scanline
    OutputUncompressed,
    /// Invoke the external wavelet inverter for one strip
    Wavelet,
    /// Stereo composition, horizontal shift
    Horizontal3d,
    /// Stereo composition, vertical shift
    Vertical3d,
    /// Vertical sharpening pass
    Sharpen,
    /// Planner: fill a cube lattice range
    BuildCube,
    /// Planner: fill gamma/contrast tables
    BuildLutCurves,
    /// Planner: fill the encoded->linear table
    Build1dToLinear,
    /// Planner: fill the linear->encoded table
    Build1dToCurve,
    /// Scope/waveform accumulation
    Histogram,
    /// Lens-warp mesh application
    Warp,
    /// Lens-warp mesh cache rebuild
    WarpCache,
    /// Lens-warp vertical blur
    WarpBlurv,
}

/// Per-worker scratch, sized lazily to the frame being decoded
pub struct WorkerScratch {
    /// Staging for two worst-case scanlines of samples
    pub rows: Vec<i16>,
    /// Packer staging
    pub pack: PackScratch,
}

impl WorkerScratch {
    fn new(use_simd: bool) -> Self {
        Self {
            rows: Vec::new(),
            pack: PackScratch {
                use_simd,
                ..PackScratch::default()
            },
        }
    }
}

/// One dispatched unit of work.
///
/// `work_count` is the number of indivisible items (typically scanlines).
/// Jobs with `levels() > 1` form a staged pipeline; each level has its own
/// item count.
pub trait PoolJob: Send + Sync {
    fn kind(&self) -> JobKind;

    fn work_count(&self) -> usize;

    fn levels(&self) -> usize {
        1
    }

    fn level_count(&self, _level: usize) -> usize {
        self.work_count()
    }

    /// Run one item. Never called twice for the same `(level, index)`.
    fn run_item(
        &self,
        level: usize,
        index: usize,
        worker: usize,
        scratch: &mut WorkerScratch,
    ) -> Result<()>;
}

enum Msg {
    Start,
    Stop,
}

struct Mailbox {
    job: Option<Arc<dyn PoolJob>>,
    counts: Vec<usize>,
}

struct Progress {
    completed: [usize; MAX_JOB_LEVELS],
    active: usize,
    error: Option<whereat::At<Error>>,
}

struct PoolShared {
    mailbox: Mutex<Mailbox>,
    claim: [AtomicUsize; MAX_JOB_LEVELS],
    failed: AtomicBool,
    progress: Mutex<Progress>,
    done_cv: Condvar,
    level_cv: Condvar,
}

/// Fixed-size worker pool
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    senders: Vec<Sender<Msg>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers. `use_simd` seeds each worker's scratch with
    /// the decoder's CPU-mask decision.
    pub fn new(threads: usize, use_simd: bool) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(PoolShared {
            mailbox: Mutex::new(Mailbox {
                job: None,
                counts: Vec::new(),
            }),
            claim: Default::default(),
            failed: AtomicBool::new(false),
            progress: Mutex::new(Progress {
                completed: [0; MAX_JOB_LEVELS],
                active: 0,
                error: None,
            }),
            done_cv: Condvar::new(),
            level_cv: Condvar::new(),
        });

        let mut senders = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);
        for worker_index in 0..threads {
            let (tx, rx) = bounded::<Msg>(1);
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("zenwave-worker-{worker_index}"))
                .spawn(move || {
                    let mut scratch = WorkerScratch::new(use_simd);
                    while let Ok(msg) = rx.recv() {
                        match msg {
                            Msg::Start => worker_cycle(&shared, worker_index, &mut scratch),
                            Msg::Stop => break,
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            senders.push(tx);
            workers.push(handle);
        }
        debug!("worker pool started with {threads} threads");
        Self {
            shared,
            senders,
            workers,
        }
    }

    /// Number of workers
    pub fn threads(&self) -> usize {
        self.senders.len()
    }

    /// Dispatch a job that borrows caller-owned buffers.
    ///
    /// Sound because [`WorkerPool::run`] returns only after every worker has
    /// dropped its clone of the job, so nothing borrowed can escape the
    /// caller's frame.
    pub fn run_scoped<'env>(&self, job: Arc<dyn PoolJob + 'env>) -> Result<()> {
        // SAFETY: the barrier in `run` outlives every worker-held clone;
        // the lifetime is erased only for the mailbox's benefit.
        let job: Arc<dyn PoolJob + 'static> =
            unsafe { std::mem::transmute::<Arc<dyn PoolJob + 'env>, Arc<dyn PoolJob>>(job) };
        self.run(job)
    }

    /// Dispatch `job` and block until every item completed.
    ///
    /// `set work count -> broadcast start -> wait all done` is a full
    /// barrier: everything dispatched before it returns is complete.
    pub fn run(&self, job: Arc<dyn PoolJob>) -> Result<()> {
        let levels = job.levels();
        assert!(levels >= 1 && levels <= MAX_JOB_LEVELS, "bad level count");
        let counts: Vec<usize> = (0..levels).map(|l| job.level_count(l)).collect();

        {
            let mut mailbox = self.shared.mailbox.lock().unwrap();
            let mut progress = self.shared.progress.lock().unwrap();
            mailbox.job = Some(Arc::clone(&job));
            mailbox.counts = counts;
            for c in &self.shared.claim {
                c.store(0, Ordering::SeqCst);
            }
            self.shared.failed.store(false, Ordering::SeqCst);
            progress.completed = [0; MAX_JOB_LEVELS];
            progress.active = self.senders.len();
            progress.error = None;
        }

        for tx in &self.senders {
            // workers drain their mailbox slot before the next frame
            tx.send(Msg::Start).expect("worker hung up");
        }

        let error = {
            let mut progress = self.shared.progress.lock().unwrap();
            while progress.active > 0 {
                progress = self.shared.done_cv.wait(progress).unwrap();
            }
            progress.error.take()
        };

        // release the mailbox's clone as well; scoped jobs must not outlive
        // this call
        self.shared.mailbox.lock().unwrap().job = None;

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for tx in &self.senders {
            let _ = tx.send(Msg::Stop);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_cycle(shared: &PoolShared, worker_index: usize, scratch: &mut WorkerScratch) {
    let (job, counts) = {
        let mailbox = shared.mailbox.lock().unwrap();
        match &mailbox.job {
            Some(job) => (Arc::clone(job), mailbox.counts.clone()),
            None => (noop_job(), Vec::new()),
        }
    };

    for (level, &count) in counts.iter().enumerate() {
        if level > 0 {
            // dependency barrier: every item of the previous level first
            let prev_needed = counts[level - 1];
            let mut progress = shared.progress.lock().unwrap();
            while progress.completed[level - 1] < prev_needed {
                progress = shared.level_cv.wait(progress).unwrap();
            }
        }

        loop {
            let index = shared.claim[level].fetch_add(1, Ordering::SeqCst);
            if index >= count {
                break;
            }

            // drain claims without running once the job failed
            if !shared.failed.load(Ordering::SeqCst) {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    job.run_item(level, index, worker_index, scratch)
                }));
                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(_) => {
                        warn!("worker {worker_index} panicked in {:?} item {index}", job.kind());
                        Some(at(Error::Worker("worker thread panicked")))
                    }
                };
                if let Some(e) = failure {
                    shared.failed.store(true, Ordering::SeqCst);
                    let mut progress = shared.progress.lock().unwrap();
                    if progress.error.is_none() {
                        progress.error = Some(e);
                    }
                }
            }

            let mut progress = shared.progress.lock().unwrap();
            progress.completed[level] += 1;
            if progress.completed[level] == count {
                shared.level_cv.notify_all();
            }
        }
    }

    // the job must be released before the barrier trips: `run_scoped`
    // callers may own buffers the job borrows
    drop(job);

    let mut progress = shared.progress.lock().unwrap();
    progress.active -= 1;
    if progress.active == 0 {
        shared.done_cv.notify_all();
    }
}

// Placeholder for the impossible empty-mailbox start
fn noop_job() -> Arc<dyn PoolJob> {
    struct Noop;
    impl PoolJob for Noop {
        fn kind(&self) -> JobKind {
            JobKind::Output
        }
        fn work_count(&self) -> usize {
            0
        }
        fn run_item(&self, _: usize, _: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
            Ok(())
        }
    }
    Arc::new(Noop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct CountJob {
        counter: AtomicUsize,
        total: usize,
    }

    impl PoolJob for CountJob {
        fn kind(&self) -> JobKind {
            JobKind::Output
        }
        fn work_count(&self) -> usize {
            self.total
        }
        fn run_item(&self, _: usize, _: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn barrier_runs_every_item_exactly_once() {
        let pool = WorkerPool::new(8, false);
        let job = Arc::new(CountJob {
            counter: AtomicUsize::new(0),
            total: 1000,
        });
        pool.run(job.clone()).unwrap();
        assert_eq!(job.counter.load(Ordering::SeqCst), 1000);
    }

    struct XorJob {
        xor: AtomicU64,
    }

    impl PoolJob for XorJob {
        fn kind(&self) -> JobKind {
            JobKind::Output
        }
        fn work_count(&self) -> usize {
            1000
        }
        fn run_item(&self, _: usize, index: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
            self.xor.fetch_xor(index as u64, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn claimed_indices_cover_the_range() {
        let pool = WorkerPool::new(8, false);
        let job = Arc::new(XorJob {
            xor: AtomicU64::new(0),
        });
        pool.run(job.clone()).unwrap();
        // xor of 0..1000 is 0, so full coverage leaves the accumulator empty
        let expected = (0u64..1000).fold(0, |a, b| a ^ b);
        assert_eq!(job.xor.load(Ordering::SeqCst), expected);
        assert_eq!(expected, 0);
    }

    struct LevelJob {
        order: Mutex<Vec<(usize, usize)>>,
    }

    impl PoolJob for LevelJob {
        fn kind(&self) -> JobKind {
            JobKind::Wavelet
        }
        fn work_count(&self) -> usize {
            12
        }
        fn levels(&self) -> usize {
            3
        }
        fn level_count(&self, level: usize) -> usize {
            match level {
                0 => 12,
                1 => 6,
                _ => 3,
            }
        }
        fn run_item(&self, level: usize, index: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
            self.order.lock().unwrap().push((level, index));
            Ok(())
        }
    }

    #[test]
    fn levels_complete_in_order() {
        let pool = WorkerPool::new(4, false);
        let job = Arc::new(LevelJob {
            order: Mutex::new(Vec::new()),
        });
        pool.run(job.clone()).unwrap();
        let order = job.order.lock().unwrap();
        assert_eq!(order.len(), 12 + 6 + 3);
        let first_l1 = order.iter().position(|&(l, _)| l == 1).unwrap();
        let last_l0 = order.iter().rposition(|&(l, _)| l == 0).unwrap();
        assert!(last_l0 < first_l1, "level 1 item ran before level 0 drained");
        let first_l2 = order.iter().position(|&(l, _)| l == 2).unwrap();
        let last_l1 = order.iter().rposition(|&(l, _)| l == 1).unwrap();
        assert!(last_l1 < first_l2);
    }

    struct FailJob;

    impl PoolJob for FailJob {
        fn kind(&self) -> JobKind {
            JobKind::Output
        }
        fn work_count(&self) -> usize {
            64
        }
        fn run_item(&self, _: usize, index: usize, _: usize, _: &mut WorkerScratch) -> Result<()> {
            if index == 7 {
                return Err(at(Error::Worker("synthetic failure")));
            }
            Ok(())
        }
    }

    #[test]
    fn worker_error_reaches_the_caller() {
        let pool = WorkerPool::new(4, false);
        let err = pool.run(Arc::new(FailJob)).unwrap_err();
        assert!(err.to_string().contains("synthetic failure"));
    }

    #[test]
    fn pool_survives_consecutive_jobs() {
        let pool = WorkerPool::new(3, false);
        for _ in 0..16 {
            let job = Arc::new(CountJob {
                counter: AtomicUsize::new(0),
                total: 37,
            });
            pool.run(job.clone()).unwrap();
            assert_eq!(job.counter.load(Ordering::SeqCst), 37);
        }
    }
}
