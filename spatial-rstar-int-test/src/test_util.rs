use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstar::primitives::{GeomWithData, Rectangle as OracleRect};
use rstar::{RTree, AABB};
use spatial_rstar::{ExternalSequence, RStarTree, RTreeResult, Rectangle};
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test between a setup and a teardown step, reporting panics and
/// errors with the time the test took.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> RTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> RTreeResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> RTreeResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", err_msg), Backtrace::capture().to_string())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed: {}", error);
}

/// A scratch directory holding the files of one test.
#[derive(Clone)]
pub struct TestContext {
    dir: PathBuf,
}

impl TestContext {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the test directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("spatial_rstar_{}", id))
}

pub fn create_test_context() -> RTreeResult<TestContext> {
    let path = random_path();
    if path.exists() {
        let _ = fs::remove_dir_all(&path);
    }
    fs::create_dir_all(&path)?;
    Ok(TestContext::new(path))
}

pub fn cleanup(ctx: TestContext) -> RTreeResult<()> {
    let max_retries = 5;
    for retry in 0..max_retries {
        match fs::remove_dir_all(ctx.dir()) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if retry < max_retries - 1 => {
                log::debug!("Retrying removal of {:?}: {}", ctx.dir(), e);
                thread::sleep(Duration::from_millis(50 * (retry as u64 + 1)));
            }
            Err(e) => {
                // Temp files will be cleaned up by the OS eventually
                eprintln!("Warning: Failed to remove test directory {:?}: {:?}", ctx.dir(), e);
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Rectangles with corners in `[0, extent)` and sides up to `max_side`.
pub fn random_rects(seed: u64, count: u64, extent: f64, max_side: f64) -> Vec<Rectangle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|id| {
            let x = rng.random_range(0.0..extent);
            let y = rng.random_range(0.0..extent);
            let w = rng.random_range(0.0..max_side);
            let h = rng.random_range(0.0..max_side);
            Rectangle::new(id, x, y, x + w, y + h)
        })
        .collect()
}

/// Random query windows over the same space as [`random_rects`].
pub fn random_windows(seed: u64, count: usize, extent: f64, max_side: f64) -> Vec<Rectangle> {
    random_rects(seed, count as u64, extent, max_side)
        .into_iter()
        .map(|r| r.with_id(0))
        .collect()
}

pub fn write_sequence(path: &Path, rects: &[Rectangle]) -> RTreeResult<()> {
    let mut sequence = ExternalSequence::create(path)?;
    for r in rects {
        sequence.append(r)?;
    }
    sequence.flush()
}

pub type OracleEntry = GeomWithData<OracleRect<[f64; 2]>, u64>;

pub fn oracle_entry(r: &Rectangle) -> OracleEntry {
    GeomWithData::new(
        OracleRect::from_corners([r.xlo(), r.ylo()], [r.xhi(), r.yhi()]),
        r.id(),
    )
}

/// An in-memory `rstar` tree holding the same rectangles.
pub fn oracle(rects: &[Rectangle]) -> RTree<OracleEntry> {
    RTree::bulk_load(rects.iter().map(oracle_entry).collect())
}

/// Sorted ids the oracle reports for `window`.
pub fn oracle_query(oracle: &RTree<OracleEntry>, window: &Rectangle) -> Vec<u64> {
    let envelope = AABB::from_corners([window.xlo(), window.ylo()], [window.xhi(), window.yhi()]);
    let mut ids: Vec<u64> = oracle
        .locate_in_envelope_intersecting(&envelope)
        .map(|entry| entry.data)
        .collect();
    ids.sort_unstable();
    ids
}

/// Sorted ids the tree reports for `window`.
pub fn tree_query(tree: &RStarTree, window: &Rectangle) -> RTreeResult<Vec<u64>> {
    let mut ids: Vec<u64> = tree.query(window, false)?.iter().map(|r| r.id()).collect();
    ids.sort_unstable();
    Ok(ids)
}

/// Asserts the tree is structurally valid and answers every window like
/// the oracle.
pub fn assert_matches_oracle(
    tree: &RStarTree,
    oracle: &RTree<OracleEntry>,
    windows: &[Rectangle],
) -> RTreeResult<()> {
    let check = tree.check_tree()?;
    assert!(check.is_valid(), "{}", check);
    assert_eq!(check.objects, oracle.size() as u64);
    assert_eq!(tree.total_objects(), oracle.size() as u64);

    for window in windows {
        assert_eq!(tree_query(tree, window)?, oracle_query(oracle, window), "window {}", window);
    }
    Ok(())
}
