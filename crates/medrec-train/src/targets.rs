//! Per-visit supervision targets.

/// Dense 0/1 target over the medication vocabulary.
pub fn dense_target(medications: &[usize], num_med: usize) -> Vec<f32> {
    let mut target = vec![0f32; num_med];
    for &med in medications {
        target[med] = 1.0;
    }
    target
}

/// Margin-loss target: the true medication indices in visit order, padded
/// with `-1` to length `num_med`.
pub fn margin_target(medications: &[usize], num_med: usize) -> Vec<i64> {
    let mut target = vec![-1i64; num_med];
    for (slot, &med) in target.iter_mut().zip(medications) {
        *slot = med as i64;
    }
    target
}
