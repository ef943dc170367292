use spatial_rstar::{
    read_mbr_cache, write_mbr_cache, BulkLoadConfig, BulkLoader, RStarTree, RTreeError, Rectangle, TreeConfig,
};
use spatial_rstar_int_test::test_util::{
    assert_matches_oracle, cleanup, create_test_context, oracle, random_rects, random_windows, run_test,
    tree_query, write_sequence,
};

#[test]
fn test_hilbert_load_matches_oracle() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("input.seq");
            let rects = random_rects(201, 20_000, 100_000.0, 500.0);
            write_sequence(&input, &rects)?;

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().temp_dir(ctx.dir()));
            let tree = loader.build_hilbert(ctx.file("hilbert.tree"))?;
            assert_eq!(tree.fanout(), 50);
            assert!(tree.height() >= 2);

            let windows = random_windows(202, 25, 100_000.0, 10_000.0);
            assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_packed_load_matches_oracle() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("input.seq");
            let rects = random_rects(211, 20_000, 100_000.0, 500.0);
            write_sequence(&input, &rects)?;

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().sort_run_len(1_000));
            let tree = loader.build_packed(ctx.file("packed.tree"))?;

            let windows = random_windows(212, 25, 100_000.0, 10_000.0);
            assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_load_equals_one_by_one_insertion() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("input.seq");
            let rects = random_rects(221, 3_000, 10_000.0, 100.0);
            write_sequence(&input, &rects)?;

            let mut inserted: RStarTree = RStarTree::in_memory(&TreeConfig::new().fanout(20))?;
            for r in &rects {
                inserted.insert(*r)?;
            }
            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().fanout(20));
            let hilbert = loader.build_hilbert(ctx.file("hilbert.tree"))?;
            let packed = loader.build_packed(ctx.file("packed.tree"))?;

            for window in random_windows(222, 30, 10_000.0, 2_000.0) {
                let expected = tree_query(&inserted, &window)?;
                assert_eq!(tree_query(&hilbert, &window)?, expected);
                assert_eq!(tree_query(&packed, &window)?, expected);
            }
            hilbert.close()?;
            packed.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_bulk_loaded_tree_supports_updates() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("input.seq");
            let mut rects = random_rects(231, 5_000, 10_000.0, 100.0);
            write_sequence(&input, &rects)?;

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().fanout(16));
            let name = ctx.file("updated.tree");
            let mut tree = loader.build_packed(&name)?;

            let extra: Vec<Rectangle> = random_rects(232, 1_000, 10_000.0, 100.0)
                .into_iter()
                .map(|r| r.with_id(r.id() + 100_000))
                .collect();
            for r in &extra {
                tree.insert(*r)?;
            }
            for r in rects.drain(..2_000) {
                tree.remove(&r)?;
            }
            rects.extend(extra);
            tree.close()?;

            let tree: RStarTree = RStarTree::open(&name, 16)?;
            let windows = random_windows(233, 20, 10_000.0, 2_000.0);
            assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_fanout_four_bulk_tree_drains_and_accepts_inserts() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("input.seq");
            let rects = random_rects(251, 600, 1_000.0, 20.0);
            write_sequence(&input, &rects)?;
            let windows = random_windows(252, 10, 1_000.0, 300.0);

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().fanout(4));
            for name in ["hilbert.tree", "packed.tree"] {
                let mut tree = if name == "hilbert.tree" {
                    loader.build_hilbert(ctx.file(name))?
                } else {
                    loader.build_packed(ctx.file(name))?
                };
                assert_matches_oracle(&tree, &oracle(&rects), &windows)?;

                for r in rects.iter().rev() {
                    tree.remove(r)?;
                }
                assert_eq!(tree.height(), 0);
                assert!(tree.node(tree.root_id())?.is_leaf());
                assert!(tree.check_tree()?.is_valid());

                for r in &rects {
                    tree.insert(*r)?;
                }
                assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
                tree.close()?;
            }
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_named_builds_reuse_existing_tree() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("cities.seq");
            let rects = random_rects(241, 2_000, 1_000.0, 10.0);
            write_sequence(&input, &rects)?;

            let mbr = write_mbr_cache::<f64>(&input)?;
            assert_eq!(read_mbr_cache::<f64>(&input)?, Some(mbr));
            assert!(rects.iter().all(|r| mbr.contains(r)));

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new().fanout(30));
            let first = loader.build_packed_file()?;
            let root = first.root_id();
            first.close()?;
            assert!(ctx.file("cities.seq.rstree").exists());
            assert!(ctx.file("cities.seq.rstree.info").exists());

            let again = loader.build_packed_file()?;
            assert_eq!(again.root_id(), root);
            let windows = random_windows(242, 10, 1_000.0, 200.0);
            assert_matches_oracle(&again, &oracle(&rects), &windows)?;
            again.close()?;

            let hilbert = loader.build_hilbert_file()?;
            assert!(ctx.file("cities.seq.hrtree").exists());
            assert_matches_oracle(&hilbert, &oracle(&rects), &windows)?;
            hilbert.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_empty_input_is_end_of_input() {
    run_test(
        || create_test_context(),
        |ctx| {
            let input = ctx.file("empty.seq");
            write_sequence(&input, &[])?;

            let loader: BulkLoader = BulkLoader::new(&input, BulkLoadConfig::new());
            assert!(matches!(loader.build_hilbert_file(), Err(RTreeError::EndOfInput)));
            assert!(matches!(loader.build_packed_file(), Err(RTreeError::EndOfInput)));
            assert!(matches!(write_mbr_cache::<f64>(&input), Err(RTreeError::EndOfInput)));
            assert!(!ctx.file("empty.seq.hrtree").exists());
            assert!(!ctx.file("empty.seq.rstree").exists());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
