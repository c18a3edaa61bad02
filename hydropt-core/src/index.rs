//! Mixed-radix encoding/decoding of the product state space.
//!
//! A product state is a tuple `(k_0, ..., k_{B-1})` of per-basin volume
//! indices. It is linearised with basin `0` as the most significant digit:
//! `idx = sum(k_b * stride_b)` with `stride_b = product(num_states[b+1..])`.
//! This mirrors the `kron_index`/`kron_basis_map` convention of the
//! original dynamic-programming core this crate generalises.

/// The stride (linear-index step) of each basin coordinate, most significant first.
pub fn strides(num_states: &[usize]) -> Vec<usize> {
    let b = num_states.len();
    let mut out = vec![1usize; b];
    for i in (0..b.saturating_sub(1)).rev() {
        out[i] = out[i + 1] * num_states[i + 1];
    }
    out
}

/// Total size of the product state space, `S = product(num_states)`.
pub fn product_state_count(num_states: &[usize]) -> usize {
    num_states.iter().product()
}

/// For every linear product-state index, the basin-`position` coordinate
/// component. Length `S = product(num_states)`.
pub fn kron_index(num_states: &[usize], position: usize) -> Vec<usize> {
    let s = product_state_count(num_states);
    let stride = strides(num_states)[position];
    (0..s).map(|idx| (idx / stride) % num_states[position]).collect()
}

/// Compose a linear product-state index from per-basin coordinates.
pub fn linear_index(coords: &[usize], num_states: &[usize]) -> usize {
    let strides = strides(num_states);
    coords.iter().zip(strides.iter()).map(|(k, s)| k * s).sum()
}

/// Decode a linear product-state index back into per-basin coordinates.
pub fn decode_index(idx: usize, num_states: &[usize]) -> Vec<usize> {
    let strides = strides(num_states);
    strides
        .iter()
        .zip(num_states.iter())
        .map(|(&stride, &n)| (idx / stride) % n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_spec_definition() {
        // N = [2, 3, 5]; stride_0 = 3*5=15, stride_1 = 5, stride_2 = 1
        assert_eq!(strides(&[2, 3, 5]), vec![15, 5, 1]);
    }

    #[test]
    fn kron_index_has_correct_periodicity() {
        let num_states = [2usize, 3usize];
        let s = product_state_count(&num_states);
        assert_eq!(s, 6);

        // basin 1 (fastest-varying) cycles 0,1,2,0,1,2
        let k1 = kron_index(&num_states, 1);
        assert_eq!(k1, vec![0, 1, 2, 0, 1, 2]);

        // basin 0 (slowest-varying) cycles 0,0,0,1,1,1
        let k0 = kron_index(&num_states, 0);
        assert_eq!(k0, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn linear_index_and_decode_round_trip() {
        let num_states = [4usize, 3usize, 2usize];
        let s = product_state_count(&num_states);
        for idx in 0..s {
            let coords = decode_index(idx, &num_states);
            assert_eq!(linear_index(&coords, &num_states), idx);
        }
    }
}
