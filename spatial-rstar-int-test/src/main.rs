use spatial_rstar::{BulkLoadConfig, BulkLoader, RStarTree, RTreeResult, Rectangle};
use spatial_rstar_int_test::test_util::{cleanup, create_test_context, random_rects, write_sequence};

fn main() -> RTreeResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let count = 200_000;
    let rects = random_rects(1, count, 100_000.0, 100.0);

    let start = std::time::Instant::now();
    let mut tree: RStarTree = RStarTree::open(ctx.file("stress.tree"), 50)?;
    for r in &rects {
        tree.insert(*r)?;
    }
    println!("Inserted {} rectangles in {:?}", count, start.elapsed());
    println!("{}", tree.stats());

    let start = std::time::Instant::now();
    let window = Rectangle::new(0, 40_000.0, 40_000.0, 60_000.0, 60_000.0);
    let hits = tree.query(&window, false)?;
    println!("Found {} rectangles in {:?}", hits.len(), start.elapsed());

    let start = std::time::Instant::now();
    for r in rects.iter().step_by(2) {
        tree.remove(r)?;
    }
    println!("Removed {} rectangles in {:?}", count / 2, start.elapsed());
    tree.close()?;

    let input = ctx.file("stress.seq");
    write_sequence(&input, &rects)?;
    let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new());

    let start = std::time::Instant::now();
    let hilbert = loader.build_hilbert_file()?;
    println!("Hilbert bulk load in {:?}", start.elapsed());
    println!("{}", hilbert.stats());
    hilbert.close()?;

    let start = std::time::Instant::now();
    let packed = loader.build_packed_file()?;
    println!("Packed bulk load in {:?}", start.elapsed());
    println!("{}", packed.stats());
    packed.close()?;

    cleanup(ctx)
}
