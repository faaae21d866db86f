//! ECMP weight vectors for next-hop groups.

/// Produces `fan_out` next-hop weights for a group.
///
/// - `fan_out == 1`: `[weight_sum]`
/// - `weight_sum <= fan_out`: all ones (the sum may fall short of `weight_sum`)
/// - `fan_out == 2`: `[1, weight_sum - 1]`
/// - otherwise `[1, 2, ...]`, the remaining `fan_out - 2` slots splitting
///   `weight_sum - 3` evenly with the first of them taking the remainder
///
/// ```
/// use gribi_scale::weights::generate_weights;
///
/// assert_eq!(generate_weights(16, 8), vec![1, 2, 3, 2, 2, 2, 2, 2]);
/// ```
pub fn generate_weights(weight_sum: u64, fan_out: usize) -> Vec<u64> {
    let slots = fan_out as u64;
    match fan_out {
        0 => Vec::new(),
        1 => vec![weight_sum],
        _ if weight_sum <= slots => vec![1; fan_out],
        2 => vec![1, weight_sum - 1],
        _ => {
            let residual = weight_sum - 3;
            let share = residual / (slots - 2);
            let remainder = residual % (slots - 2);

            let mut weights = Vec::with_capacity(fan_out);
            weights.extend([1, 2, share + remainder]);
            weights.extend(std::iter::repeat(share).take(fan_out - 3));
            weights
        }
    }
}
