use std::num::NonZeroUsize;

/// Number of chunks needed to hold `len` bytes: `ceil(len / chunk_size)`.
/// Zero bytes need zero chunks.
pub fn num_chunks(len: usize, chunk_size: NonZeroUsize) -> usize {
    let chunk_size = chunk_size.get();
    len / chunk_size + if len % chunk_size > 0 { 1 } else { 0 }
}

/// Split data into consecutive slices of `chunk_size` bytes. Only the last
/// slice may be shorter. Slice `i` belongs to the `i`th allocated chunk.
pub fn data_to_chunks(data: &[u8], chunk_size: NonZeroUsize) -> Vec<&[u8]> {
    data.chunks(chunk_size.get()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn chunk_count_is_ceiling() {
        assert_eq!(num_chunks(0, size(10)), 0);
        assert_eq!(num_chunks(1, size(10)), 1);
        assert_eq!(num_chunks(10, size(10)), 1);
        assert_eq!(num_chunks(11, size(10)), 2);
        assert_eq!(num_chunks(37, size(10)), 4);
        assert_eq!(num_chunks(5, size(1)), 5);
    }

    #[test]
    fn last_chunk_holds_remainder() {
        let data = b"This file tells you all about python.";
        assert_eq!(data.len(), 37);

        let chunks = data_to_chunks(data, size(10));
        assert_eq!(chunks.len(), num_chunks(data.len(), size(10)));
        assert_eq!(chunks[0], b"This file ");
        assert_eq!(chunks[3].len(), 7);
        assert_eq!(chunks.concat(), data.to_vec());
    }

    #[test]
    fn empty_data_has_no_chunks() {
        assert!(data_to_chunks(&[], size(10)).is_empty());
    }
}
