use super::*;

/// Computes the authentication path a miner needs to rebuild the merkle root
/// from the coinbase hash alone. `hashes` are the non-coinbase transaction
/// hashes in internal byte order; slot zero of every level is reserved for
/// the not-yet-known coinbase and never hashed.
pub fn steps(hashes: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut level = Vec::with_capacity(hashes.len() + 1);
    level.push([0u8; 32]);
    level.extend_from_slice(hashes);

    let mut steps = Vec::new();

    while level.len() > 1 {
        steps.push(level[1]);

        if level.len() % 2 == 1 {
            level.push(*level.last().expect("level is non-empty"));
        }

        let mut next = Vec::with_capacity(level.len() / 2);
        next.push([0u8; 32]);
        for pair in level[2..].chunks_exact(2) {
            next.push(hash_pair(&pair[0], &pair[1]));
        }

        level = next;
    }

    steps
}

/// Folds the coinbase hash through the authentication path, yielding the
/// merkle root in internal byte order.
pub fn fold(coinbase_hash: [u8; 32], steps: &[[u8; 32]]) -> [u8; 32] {
    steps
        .iter()
        .fold(coinbase_hash, |root, step| hash_pair(&root, step))
}

fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut concat = [0u8; 64];
    concat[..32].copy_from_slice(a);
    concat[32..].copy_from_slice(b);
    util::sha256d(&concat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u8) -> [u8; 32] {
        [n; 32]
    }

    /// Plain bottom-up merkle root over all leaves, duplicating the last
    /// element of odd levels. The steps/fold pair must agree with this.
    fn naive_root(leaves: &[[u8; 32]]) -> [u8; 32] {
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            level = level
                .chunks_exact(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        level[0]
    }

    #[test]
    fn no_transactions_means_no_steps() {
        assert!(steps(&[]).is_empty());
        assert_eq!(fold(tx(9), &[]), tx(9));
    }

    #[test]
    fn single_transaction_is_its_own_branch() {
        assert_eq!(steps(&[tx(1)]), vec![tx(1)]);
    }

    #[test]
    fn three_transactions() {
        // [ slot, t1, t2, t3 ] → steps = [ t1, H(t2||t3) ]
        let branch = steps(&[tx(1), tx(2), tx(3)]);
        assert_eq!(branch, vec![tx(1), hash_pair(&tx(2), &tx(3))]);
    }

    #[test]
    fn two_transactions_duplicate_the_odd_level() {
        // [ slot, t1, t2 ] → [ slot, t1, t2, t2 ] → steps = [ t1, H(t2||t2) ]
        let branch = steps(&[tx(1), tx(2)]);
        assert_eq!(branch, vec![tx(1), hash_pair(&tx(2), &tx(2))]);
    }

    #[test]
    fn fold_matches_full_tree() {
        let coinbase = tx(0xcb);
        for n in 0..9u8 {
            let hashes: Vec<[u8; 32]> = (1..=n).map(tx).collect();

            let mut leaves = vec![coinbase];
            leaves.extend_from_slice(&hashes);

            assert_eq!(
                fold(coinbase, &steps(&hashes)),
                naive_root(&leaves),
                "mismatch at {n} transactions"
            );
        }
    }

    #[test]
    fn branch_length_is_tree_depth() {
        for n in 0..33usize {
            let hashes: Vec<[u8; 32]> = (0..n).map(|i| tx(i as u8)).collect();
            let expected = ((n + 1) as f64).log2().ceil() as usize;
            assert_eq!(steps(&hashes).len(), expected, "mismatch at {n} transactions");
        }
    }
}
