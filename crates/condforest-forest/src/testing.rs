//! Small hand-built forests shared by unit tests.

use crate::{Forest, TreeArrays};

/// Root splits X1 at 0.0; left leaf holds rows {0, 1}, right leaf {2, 3}.
pub(crate) fn stump_tree() -> TreeArrays {
    TreeArrays {
        root: 0,
        left_children: vec![1, 0, 0],
        right_children: vec![2, 0, 0],
        split_variables: vec![0, 0, 0],
        split_values: vec![0.0, 0.0, 0.0],
        leaf_samples: vec![vec![], vec![0, 1], vec![2, 3]],
        drawn_samples: vec![0, 1, 2, 3],
    }
}

/// Two-level tree over six rows:
///
/// ```text
/// X1 <= 0 ── X2 <= 1 ── {0}
///          │         └─ {1, 2}
///          └ {3, 4, 5}
/// ```
///
/// Arena order deliberately differs from breadth-first order.
pub(crate) fn two_level_tree() -> TreeArrays {
    TreeArrays {
        root: 0,
        left_children: vec![3, 0, 0, 4, 0],
        right_children: vec![1, 0, 0, 2, 0],
        split_variables: vec![0, 0, 0, 1, 0],
        split_values: vec![0.0, 0.0, 0.0, 1.0, 0.0],
        leaf_samples: vec![vec![], vec![3, 4, 5], vec![1, 2], vec![], vec![0]],
        drawn_samples: vec![0, 1, 2, 3, 4, 5],
    }
}

/// One stump tree over four rows with two features and one response.
pub(crate) fn stump_forest() -> Forest {
    let features = vec![
        vec![-1.0, 5.0],
        vec![-2.0, 6.0],
        vec![1.0, 7.0],
        vec![2.0, 8.0],
    ];
    let responses = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
    Forest::new(vec![stump_tree()], features, responses).unwrap()
}

/// Six rows, two features, two responses, trees `[two_level_tree, stump-like]`.
pub(crate) fn six_row_forest() -> Forest {
    let features = vec![
        vec![-1.0, 0.0],
        vec![-1.0, 2.0],
        vec![-3.0, 4.0],
        vec![1.0, 0.0],
        vec![2.0, 1.0],
        vec![3.0, 2.0],
    ];
    let responses = vec![
        vec![1.0, 10.0],
        vec![2.0, 20.0],
        vec![3.0, 30.0],
        vec![4.0, 40.0],
        vec![5.0, 50.0],
        vec![6.0, 60.0],
    ];
    // Second tree splits X2 at 1.0, grown on rows {0, 2, 4, 5}.
    let second = TreeArrays {
        root: 0,
        left_children: vec![1, 0, 0],
        right_children: vec![2, 0, 0],
        split_variables: vec![1, 0, 0],
        split_values: vec![1.0, 0.0, 0.0],
        leaf_samples: vec![vec![], vec![0, 4], vec![2, 5]],
        drawn_samples: vec![0, 2, 4, 5],
    };
    Forest::new(vec![two_level_tree(), second], features, responses).unwrap()
}
