use blake2::{
    digest::consts::{U20, U32, U4},
    Blake2b, Digest,
};

type Blake2b256 = Blake2b<U32>;
type Blake2b160 = Blake2b<U20>;
type Blake2b32 = Blake2b<U4>;

fn digest_into<D: Digest, const N: usize, S: AsRef<[u8]>>(bytes: &[S]) -> [u8; N] {
    let mut hasher = D::new();
    bytes.iter().for_each(|b| hasher.update(b));
    let mut out = [0u8; N];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn blake2b_256<S: AsRef<[u8]>>(bytes: &[S]) -> [u8; 32] {
    //! Compute blake2b hash with 32-byte digest.
    //!
    //! Builds a hash iteratively by updating with every element
    //! of the input sequence.
    digest_into::<Blake2b256, 32, S>(bytes)
}

pub fn blake2b_160<S: AsRef<[u8]>>(bytes: &[S]) -> [u8; 20] {
    //! Compute blake2b hash with 20-byte digest (address payloads).
    digest_into::<Blake2b160, 20, S>(bytes)
}

pub(crate) fn blake2b_checksum<S: AsRef<[u8]>>(bytes: &[S]) -> [u8; 4] {
    digest_into::<Blake2b32, 4, S>(bytes)
}

#[inline]
pub(crate) fn lstrip<S: AsRef<[u8]>>(bytes: S) -> Vec<u8> {
    bytes
        .as_ref()
        .iter()
        .skip_while(|&&x| x == 0)
        .copied()
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_digest_lengths_are_independent() {
        // Blake2b mixes the output length into the parameter block,
        // so a shorter digest is not a prefix of a longer one.
        let long = blake2b_256(&[b"filecoin"]);
        let short = blake2b_160(&[b"filecoin"]);
        assert_ne!(&long[..20], &short[..]);
        assert_ne!(&short[..4], &blake2b_checksum(&[b"filecoin"])[..]);
    }

    #[test]
    fn test_chunked_update() {
        assert_eq!(
            blake2b_256(&[&b"file"[..], &b"coin"[..]]),
            blake2b_256(&[b"filecoin"])
        );
    }

    #[test]
    fn test_lstrip() {
        assert_eq!(lstrip([0u8, 0, 1, 0]), vec![1, 0]);
        assert!(lstrip([0u8; 4]).is_empty());
    }
}
