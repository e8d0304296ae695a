//! Tree-shaped speculation metadata.
//!
//! Multiple candidate continuations (paths) for one request, flattened into
//! shared arrays with explicit parent pointers and depths. The verifier
//! evaluates every path independently and records the index of the one that
//! accepted the most tokens.

use crate::types::SpecDecodeError;

/// Flattened multi-path speculation tree.
#[derive(Debug, Clone)]
pub struct TreeVerificationMetadata {
    /// All paths' tokens, concatenated.
    pub tree_token_ids: Vec<u32>,
    /// Parent of each node as an index into `tree_token_ids`; `-1` for
    /// path roots.
    pub tree_parent_indices: Vec<i32>,
    /// Distance of each node from its path root.
    pub tree_depths: Vec<usize>,
    /// Token count of each path.
    pub path_lengths: Vec<usize>,
    /// Offset of each path in the flat arrays.
    pub path_start_indices: Vec<usize>,
    /// Winning path, set by the verifier.
    pub best_path_index: Option<usize>,
}

impl TreeVerificationMetadata {
    /// Build a tree from per-path tokens and per-path parent pointers.
    ///
    /// Parent pointers are local to their path: `-1` marks a root and any
    /// other value must reference an earlier node of the same path. They
    /// are re-offset into the flat arrays here.
    pub fn from_tree(
        tokens_per_path: &[Vec<u32>],
        parents_per_path: &[Vec<i32>],
    ) -> Result<Self, SpecDecodeError> {
        if tokens_per_path.len() != parents_per_path.len() {
            return Err(SpecDecodeError::MalformedTree(format!(
                "{} token paths but {} parent paths",
                tokens_per_path.len(),
                parents_per_path.len()
            )));
        }

        let total: usize = tokens_per_path.iter().map(Vec::len).sum();
        let mut tree = Self {
            tree_token_ids: Vec::with_capacity(total),
            tree_parent_indices: Vec::with_capacity(total),
            tree_depths: Vec::with_capacity(total),
            path_lengths: Vec::with_capacity(tokens_per_path.len()),
            path_start_indices: Vec::with_capacity(tokens_per_path.len()),
            best_path_index: None,
        };

        for (path_idx, (tokens, parents)) in
            tokens_per_path.iter().zip(parents_per_path).enumerate()
        {
            if tokens.len() != parents.len() {
                return Err(SpecDecodeError::MalformedTree(format!(
                    "path {path_idx}: {} tokens but {} parents",
                    tokens.len(),
                    parents.len()
                )));
            }
            let start = tree.tree_token_ids.len();
            let mut depths: Vec<usize> = Vec::with_capacity(parents.len());
            for (node, &parent) in parents.iter().enumerate() {
                if parent == -1 {
                    depths.push(0);
                    tree.tree_parent_indices.push(-1);
                    continue;
                }
                if parent < 0 || parent as usize >= node {
                    return Err(SpecDecodeError::MalformedTree(format!(
                        "path {path_idx}: node {node} has parent {parent}, \
                         expected -1 or an earlier node"
                    )));
                }
                depths.push(depths[parent as usize] + 1);
                tree.tree_parent_indices.push(parent + start as i32);
            }
            tree.tree_token_ids.extend_from_slice(tokens);
            tree.tree_depths.extend_from_slice(&depths);
            tree.path_start_indices.push(start);
            tree.path_lengths.push(tokens.len());
        }

        debug_assert_eq!(
            tree.path_lengths.iter().sum::<usize>(),
            tree.tree_token_ids.len()
        );
        Ok(tree)
    }

    /// Build a tree of linear chains: node `j` of each path is the child of
    /// node `j - 1`.
    pub fn from_linear_paths(paths: &[Vec<u32>]) -> Result<Self, SpecDecodeError> {
        let parents: Vec<Vec<i32>> = paths
            .iter()
            .map(|path| (0..path.len()).map(|j| j as i32 - 1).collect())
            .collect();
        Self::from_tree(paths, &parents)
    }

    pub fn num_paths(&self) -> usize {
        self.path_lengths.len()
    }

    /// Total nodes across all paths.
    pub fn total_tokens(&self) -> usize {
        self.tree_token_ids.len()
    }

    /// Tokens of path `i`, if it exists.
    pub fn get_path_tokens(&self, i: usize) -> Option<&[u32]> {
        let start = *self.path_start_indices.get(i)?;
        let len = *self.path_lengths.get(i)?;
        Some(&self.tree_token_ids[start..start + len])
    }

    /// Tokens of the winning path, once the verifier has picked one.
    pub fn get_best_path(&self) -> Option<&[u32]> {
        self.get_path_tokens(self.best_path_index?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_linear_paths() {
        let tree = TreeVerificationMetadata::from_linear_paths(&[
            vec![1, 2, 3],
            vec![4, 5],
        ])
        .expect("valid tree");
        assert_eq!(tree.tree_token_ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(tree.tree_parent_indices, vec![-1, 0, 1, -1, 3]);
        assert_eq!(tree.tree_depths, vec![0, 1, 2, 0, 1]);
        assert_eq!(tree.path_start_indices, vec![0, 3]);
        assert_eq!(tree.path_lengths, vec![3, 2]);
    }

    #[test]
    fn branching_parents_are_reoffset() {
        // Second path branches: two children of its root.
        let tree = TreeVerificationMetadata::from_tree(
            &[vec![1, 2], vec![7, 8, 9]],
            &[vec![-1, 0], vec![-1, 0, 0]],
        )
        .expect("valid tree");
        assert_eq!(tree.tree_parent_indices, vec![-1, 0, -1, 2, 2]);
        assert_eq!(tree.tree_depths, vec![0, 1, 0, 1, 1]);
    }

    #[test]
    fn path_token_readback() {
        let tree =
            TreeVerificationMetadata::from_linear_paths(&[vec![1, 2, 3], vec![4, 5]])
                .expect("valid tree");
        assert_eq!(tree.get_path_tokens(0), Some(&[1, 2, 3][..]));
        assert_eq!(tree.get_path_tokens(1), Some(&[4, 5][..]));
        assert_eq!(tree.get_path_tokens(2), None);
    }

    #[test]
    fn best_path_requires_verification() {
        let mut tree =
            TreeVerificationMetadata::from_linear_paths(&[vec![1, 2], vec![3]])
                .expect("valid tree");
        assert!(tree.get_best_path().is_none());
        tree.best_path_index = Some(1);
        assert_eq!(tree.get_best_path(), Some(&[3][..]));
    }

    #[test]
    fn mismatched_path_counts_rejected() {
        let result = TreeVerificationMetadata::from_tree(&[vec![1]], &[]);
        assert!(matches!(result, Err(SpecDecodeError::MalformedTree(_))));
    }

    #[test]
    fn mismatched_token_and_parent_lengths_rejected() {
        let result =
            TreeVerificationMetadata::from_tree(&[vec![1, 2]], &[vec![-1]]);
        assert!(matches!(result, Err(SpecDecodeError::MalformedTree(_))));
    }

    #[test]
    fn forward_parent_reference_rejected() {
        let result =
            TreeVerificationMetadata::from_tree(&[vec![1, 2]], &[vec![-1, 1]]);
        assert!(matches!(result, Err(SpecDecodeError::MalformedTree(_))));
    }

    #[test]
    fn negative_non_root_parent_rejected() {
        let result =
            TreeVerificationMetadata::from_tree(&[vec![1, 2]], &[vec![-1, -2]]);
        assert!(matches!(result, Err(SpecDecodeError::MalformedTree(_))));
    }

    #[test]
    fn empty_tree_is_valid() {
        let tree = TreeVerificationMetadata::from_linear_paths(&[]).expect("valid tree");
        assert_eq!(tree.num_paths(), 0);
        assert_eq!(tree.total_tokens(), 0);
    }
}
