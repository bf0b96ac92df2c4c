use sluice_core::types::ShardPartition;

/// Union of all ranks' stripes must reproduce the full sorted list exactly,
/// with no overlap and no omission, for any list length and world size.
#[test]
fn stripes_exactly_partition_the_file_list() {
    for total in [0usize, 1, 2, 3, 7, 8, 16, 31] {
        for world_size in [1usize, 2, 3, 4, 7, 9] {
            let files: Vec<usize> = (0..total).collect();

            let mut union: Vec<usize> = Vec::new();
            for world_rank in 0..world_size {
                let partition = ShardPartition {
                    world_rank,
                    world_size,
                };
                let stripe = partition.apply(files.clone()).unwrap();

                // Each stripe is itself in ascending order.
                assert!(stripe.windows(2).all(|w| w[0] < w[1]));
                union.extend(stripe);
            }

            union.sort_unstable();
            assert_eq!(
                union, files,
                "ranks 0..{world_size} over {total} files must partition exactly"
            );
        }
    }
}

#[test]
fn stripe_positions_follow_modular_rule() {
    let files: Vec<usize> = (0..10).collect();
    let partition = ShardPartition {
        world_rank: 1,
        world_size: 3,
    };
    let stripe = partition.apply(files).unwrap();
    assert_eq!(stripe, vec![1, 4, 7]);
}
