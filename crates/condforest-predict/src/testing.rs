//! Hand-built forest shared by unit tests.

use condforest_forest::{Forest, TreeArrays};

fn stump(feature: usize, threshold: f64, left: Vec<usize>, right: Vec<usize>) -> TreeArrays {
    TreeArrays {
        root: 0,
        left_children: vec![1, 0, 0],
        right_children: vec![2, 0, 0],
        split_variables: vec![feature, 0, 0],
        split_values: vec![threshold, 0.0, 0.0],
        leaf_samples: vec![vec![], left, right],
        drawn_samples: vec![0, 1, 2, 3],
    }
}

/// Four rows, two features, one response `Y = [1, 2, 3, 4]`, two stumps:
/// X1 <= 0 splits {0, 1} | {2, 3} and X2 <= 5.5 splits {0} | {1, 2, 3}.
///
/// Query `[-5, 0]` gets weights `{0: 0.75, 1: 0.25}`; query `[5, 9]` gets
/// `{1: 1/6, 2: 5/12, 3: 5/12}`.
pub(crate) fn two_stump_forest() -> Forest {
    let features = vec![
        vec![-1.0, 5.0],
        vec![-2.0, 6.0],
        vec![1.0, 7.0],
        vec![2.0, 8.0],
    ];
    let responses = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
    Forest::new(
        vec![
            stump(0, 0.0, vec![0, 1], vec![2, 3]),
            stump(1, 5.5, vec![0], vec![1, 2, 3]),
        ],
        features,
        responses,
    )
    .unwrap()
}

pub(crate) fn queries() -> Vec<Vec<f64>> {
    vec![vec![-5.0, 0.0], vec![5.0, 9.0]]
}
