use spatial_rstar::{Persistence, RStarTree, Rectangle, TreeConfig};
use spatial_rstar_int_test::test_util::{
    assert_matches_oracle, cleanup, create_test_context, oracle, random_rects, random_windows, run_test,
};

#[test]
fn test_reopen_after_close() {
    run_test(
        || create_test_context(),
        |ctx| {
            let name = ctx.file("parcels");
            let rects = random_rects(101, 2_000, 5_000.0, 100.0);
            let windows = random_windows(102, 20, 5_000.0, 1_000.0);

            let root = {
                let mut tree: RStarTree = RStarTree::open(&name, 24)?;
                for r in &rects {
                    tree.insert(*r)?;
                }
                let root = tree.root_id();
                tree.close()?;
                root
            };
            assert!(ctx.file("parcels.info").exists());

            let tree: RStarTree = RStarTree::open(&name, 24)?;
            assert_eq!(tree.root_id(), root);
            assert_eq!(tree.fanout(), 24);
            assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_drop_saves_changes() {
    run_test(
        || create_test_context(),
        |ctx| {
            let name = ctx.file("drop");
            let mut rects = random_rects(111, 800, 1_000.0, 30.0);
            let windows = random_windows(112, 10, 1_000.0, 300.0);

            {
                let mut tree: RStarTree = RStarTree::open(&name, 12)?;
                for r in &rects {
                    tree.insert(*r)?;
                }
            }
            {
                let mut tree: RStarTree = RStarTree::open(&name, 12)?;
                for r in rects.drain(..300) {
                    tree.remove(&r)?;
                }
            }

            let tree: RStarTree = RStarTree::open(&name, 12)?;
            assert_eq!(tree.total_objects(), 500);
            assert_matches_oracle(&tree, &oracle(&rects), &windows)?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_stored_fanout_wins_on_reopen() {
    run_test(
        || create_test_context(),
        |ctx| {
            let name = ctx.file("fanout");
            let mut tree: RStarTree = RStarTree::open(&name, 9)?;
            tree.insert(Rectangle::new(1, 0.0, 0.0, 1.0, 1.0))?;
            tree.close()?;

            let tree: RStarTree = RStarTree::open(&name, 40)?;
            assert_eq!(tree.fanout(), 9);
            assert_eq!(tree.total_objects(), 1);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_delete_persistence_leaves_no_files() {
    run_test(
        || create_test_context(),
        |ctx| {
            let name = ctx.file("scratch");
            let mut tree: RStarTree = RStarTree::open(&name, 10)?;
            for r in random_rects(121, 100, 100.0, 5.0) {
                tree.insert(r)?;
            }
            tree.sync()?;
            assert!(ctx.file("scratch.info").exists());

            tree.set_persistence(Persistence::Delete);
            drop(tree);
            assert!(!name.exists());
            assert!(!ctx.file("scratch.info").exists());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_freed_blocks_are_reused() {
    run_test(
        || create_test_context(),
        |ctx| {
            let config = TreeConfig::new().fanout(8).cache_blocks(16);
            let mut tree: RStarTree = RStarTree::open_with_config(ctx.file("churn"), &config)?;
            let rects = random_rects(131, 400, 1_000.0, 20.0);

            for r in &rects {
                tree.insert(*r)?;
            }
            let peak = tree.stats().node_count;
            for _ in 0..3 {
                for r in &rects {
                    tree.remove(r)?;
                }
                for r in &rects {
                    tree.insert(*r)?;
                }
            }

            let stats = tree.stats();
            let check = tree.check_tree()?;
            assert!(check.is_valid(), "{}", check);
            assert_eq!(stats.node_count, check.nodes);
            // Churn does not leak blocks
            assert!(stats.node_count <= peak * 2, "{} nodes, peak {}", stats.node_count, peak);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}
