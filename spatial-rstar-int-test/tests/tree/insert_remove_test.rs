use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spatial_rstar::{RStarTree, RTreeError, Rectangle, TreeConfig};
use spatial_rstar_int_test::test_util::{
    assert_matches_oracle, cleanup, create_test_context, oracle, oracle_entry, random_rects, random_windows,
    run_test, tree_query,
};

fn square(id: u64) -> Rectangle {
    let x = (id % 10) as f64 * 2.0;
    let y = (id / 10) as f64 * 2.0;
    Rectangle::new(id, x, y, x + 1.0, y + 1.0)
}

#[test]
fn test_hundred_squares_fanout_ten() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree: RStarTree = RStarTree::open(ctx.file("squares"), 10)?;
            for id in 0..100 {
                tree.insert(square(id))?;
            }

            assert_eq!(tree.total_objects(), 100);
            assert!(tree.height() >= 2, "height {}", tree.height());
            let check = tree.check_tree()?;
            assert!(check.is_valid(), "{}", check);
            assert_eq!(check.objects, 100);

            // Reverse removal empties the tree down to a bare root leaf
            for id in (0..100).rev() {
                tree.remove(&square(id))?;
            }
            assert_eq!(tree.total_objects(), 0);
            assert_eq!(tree.height(), 0);
            let root = tree.node(tree.root_id())?;
            assert!(root.is_root() && root.is_leaf());
            assert_eq!(root.len(), 0);
            assert!(tree.check_tree()?.is_valid());

            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

fn diagonal(count: u64) -> Vec<Rectangle> {
    (0..count)
        .map(|i| {
            let v = i as f64 * 5.0;
            Rectangle::new(i, v, v, v + 2.0, v + 2.0)
        })
        .collect()
}

#[test]
fn test_hundred_diagonal_rectangles_fanout_ten() {
    run_test(
        || create_test_context(),
        |ctx| {
            let rects = diagonal(100);
            let mut tree: RStarTree = RStarTree::open(ctx.file("diagonal"), 10)?;
            for r in &rects {
                tree.insert(*r)?;
            }

            assert_eq!(tree.total_objects(), 100);
            assert!(tree.height() >= 2, "height {}", tree.height());
            let check = tree.check_tree()?;
            assert!(check.is_valid(), "{}", check);

            for r in rects.iter().rev() {
                tree.remove(r)?;
            }
            assert_eq!(tree.total_objects(), 0);
            assert_eq!(tree.height(), 0);
            let root = tree.node(tree.root_id())?;
            assert!(root.is_root() && root.is_leaf());
            assert!(root.is_empty());
            assert!(tree.check_tree()?.is_valid());

            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_fanout_four_drains_and_accepts_inserts() {
    run_test(
        || create_test_context(),
        |ctx| {
            let rects = diagonal(40);
            let mut tree: RStarTree = RStarTree::open(ctx.file("small"), 4)?;
            for r in &rects {
                tree.insert(*r)?;
            }
            for r in &rects {
                tree.remove(r)?;
                let check = tree.check_tree()?;
                assert!(check.is_valid(), "{}", check);
            }
            assert_eq!(tree.height(), 0);
            assert!(tree.node(tree.root_id())?.is_leaf());

            tree.insert(Rectangle::new(1_000, 1.0, 1.0, 2.0, 2.0))?;
            assert_eq!(tree.total_objects(), 1);
            assert!(tree.check_tree()?.is_valid());

            let windows = random_windows(51, 10, 200.0, 50.0);
            let mut rng = StdRng::seed_from_u64(52);
            let mut reference = oracle(&[]);
            for r in random_rects(53, 500, 200.0, 5.0) {
                tree.insert(r)?;
                reference.insert(oracle_entry(&r));
            }
            assert!(tree.try_remove(&Rectangle::new(1_000, 1.0, 1.0, 2.0, 2.0))?);
            let mut live = random_rects(53, 500, 200.0, 5.0);
            while !live.is_empty() {
                let victim = live.swap_remove(rng.random_range(0..live.len()));
                tree.remove(&victim)?;
                assert!(reference.remove(&oracle_entry(&victim)).is_some());
                if live.len() % 100 == 0 {
                    assert_matches_oracle(&tree, &reference, &windows)?;
                }
            }
            assert_eq!(tree.height(), 0);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_row_of_squares_splits_along_x() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree: RStarTree = RStarTree::open(ctx.file("row"), 10)?;
            for id in 0..11u64 {
                let x = id as f64 * 2.0;
                tree.insert(Rectangle::new(id, x, 0.0, x + 1.0, 1.0))?;
            }
            assert_eq!(tree.height(), 1);

            let root = tree.node(tree.root_id())?;
            let covers = root.entries().to_vec();
            for (i, a) in covers.iter().enumerate() {
                for b in &covers[i + 1..] {
                    assert!(!a.intersects(b), "{} overlaps {}", a, b);
                }
            }
            for cover in &covers {
                let child = tree.node(cover.id())?;
                let mut ids: Vec<u64> = child.entries().iter().map(|r| r.id()).collect();
                ids.sort_unstable();
                // Each group is a contiguous run of the row
                assert_eq!(ids.last().copied(), Some(ids[0] + ids.len() as u64 - 1));
            }

            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_random_workload_matches_oracle() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut rng = StdRng::seed_from_u64(11);
            let mut tree: RStarTree = RStarTree::open(ctx.file("random"), 16)?;
            let mut reference = oracle(&[]);
            let mut live: Vec<Rectangle> = Vec::new();
            let windows = random_windows(12, 20, 10_000.0, 2_000.0);

            for r in random_rects(13, 3000, 10_000.0, 200.0) {
                tree.insert(r)?;
                reference.insert(oracle_entry(&r));
                live.push(r);

                if rng.random_bool(0.25) {
                    let victim = live.swap_remove(rng.random_range(0..live.len()));
                    tree.remove(&victim)?;
                    assert!(reference.remove(&oracle_entry(&victim)).is_some());
                }
            }

            assert_matches_oracle(&tree, &reference, &windows)?;
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_insert_remove_inverse() {
    let mut tree: RStarTree = RStarTree::in_memory(&TreeConfig::new().fanout(8)).unwrap();
    let base = random_rects(21, 500, 1_000.0, 50.0);
    let extra: Vec<Rectangle> = random_rects(22, 500, 1_000.0, 50.0)
        .into_iter()
        .map(|r| r.with_id(r.id() + 1_000))
        .collect();
    let windows = random_windows(23, 15, 1_000.0, 300.0);

    for r in &base {
        tree.insert(*r).unwrap();
    }
    let before: Vec<Vec<u64>> = windows.iter().map(|w| tree_query(&tree, w).unwrap()).collect();

    for r in &extra {
        tree.insert(*r).unwrap();
    }
    for r in extra.iter().rev() {
        tree.remove(r).unwrap();
    }

    let after: Vec<Vec<u64>> = windows.iter().map(|w| tree_query(&tree, w).unwrap()).collect();
    assert_eq!(before, after);
    assert_matches_oracle(&tree, &oracle(&base), &windows).unwrap();
}

#[test]
fn test_delete_of_absent_rectangle_is_idempotent() {
    let mut tree: RStarTree = RStarTree::in_memory(&TreeConfig::new().fanout(10)).unwrap();
    let rects = random_rects(31, 200, 1_000.0, 20.0);
    for r in &rects {
        tree.insert(*r).unwrap();
    }
    let absent = Rectangle::new(9_999, 5_000.0, 5_000.0, 5_001.0, 5_001.0);

    for _ in 0..3 {
        assert!(matches!(tree.remove(&absent), Err(RTreeError::NotFound { id: 9_999 })));
    }
    assert_eq!(tree.total_objects(), 200);

    let windows = random_windows(32, 10, 1_000.0, 400.0);
    assert_matches_oracle(&tree, &oracle(&rects), &windows).unwrap();
}

#[test]
fn test_brute_force_returns_everything() {
    let mut tree: RStarTree = RStarTree::in_memory(&TreeConfig::new().fanout(12)).unwrap();
    let rects = random_rects(41, 700, 1_000.0, 10.0);
    for r in &rects {
        tree.insert(*r).unwrap();
    }

    // The window is ignored in brute force mode
    let nowhere = Rectangle::new(0, -10.0, -10.0, -9.0, -9.0);
    let mut ids: Vec<u64> = tree.query(&nowhere, true).unwrap().iter().map(|r| r.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..700).collect::<Vec<_>>());
    assert!(tree.query(&nowhere, false).unwrap().is_empty());
}

#[test]
fn test_points_and_degenerate_rectangles() {
    let mut tree: RStarTree = RStarTree::in_memory(&TreeConfig::new().fanout(6)).unwrap();
    let mut rects = Vec::new();
    for i in 0..300u64 {
        let v = (i % 30) as f64;
        let r = match i % 3 {
            0 => Rectangle::point(i, v, v),
            1 => Rectangle::new(i, v, 0.0, v, 10.0),
            _ => Rectangle::new(i, 0.0, v, 10.0, v),
        };
        tree.insert(r).unwrap();
        rects.push(r);
    }

    let windows = vec![
        Rectangle::point(0, 5.0, 5.0),
        Rectangle::new(0, 0.0, 0.0, 3.0, 3.0),
        Rectangle::new(0, 20.0, -1.0, 31.0, 0.0),
    ];
    assert_matches_oracle(&tree, &oracle(&rects), &windows).unwrap();

    for r in &rects {
        tree.remove(r).unwrap();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
}
