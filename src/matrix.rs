use crate::fingerprint::{FINGERPRINT_LEN, Fingerprint};

const MAGIC: &[u8; 4] = b"FSMX";

/// Header size: magic + fingerprint + row count + dimension + nnz.
const HEADER_SIZE: usize = 4 + FINGERPRINT_LEN + 4 + 4 + 4;

/// A sparse vector with strictly increasing dimension indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Build from `(index, value)` pairs already sorted by index.
    pub fn from_sorted(entries: impl IntoIterator<Item = (u32, f32)>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self { indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Scale to unit length. A zero vector stays zero.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    /// Dot product by merging the two index lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Cosine similarity. Returns 0 when either side has zero norm.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        self.dot(other) / denom
    }
}

/// One weighted vector per exemplar, aligned with corpus order.
///
/// Binary format (compressed sparse rows):
/// - 4 bytes: magic `FSMX`
/// - 32 bytes: fingerprint of the corpus the rows were built from
/// - 4 bytes: row count R (u32 LE)
/// - 4 bytes: dimension D (u32 LE)
/// - 4 bytes: stored entry count N (u32 LE)
/// - (R + 1) * 4 bytes: row offsets (u32 LE)
/// - N * 4 bytes: dimension indices (u32 LE)
/// - N * 4 bytes: values (f32 LE)
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMatrix {
    fingerprint: Fingerprint,
    dimension: u32,
    rows: Vec<SparseVector>,
}

impl DocumentMatrix {
    pub fn new(
        fingerprint: Fingerprint,
        dimension: u32,
        rows: Vec<SparseVector>,
    ) -> Self {
        Self {
            fingerprint,
            dimension,
            rows,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&SparseVector> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let nnz: usize = self.rows.iter().map(SparseVector::nnz).sum();

        let mut offsets = Vec::with_capacity(self.rows.len() + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        offsets.push(0u32);
        for row in &self.rows {
            indices.extend_from_slice(&row.indices);
            values.extend_from_slice(&row.values);
            offsets.push(indices.len() as u32);
        }

        let byte_len = HEADER_SIZE
            + std::mem::size_of_val(offsets.as_slice())
            + std::mem::size_of_val(indices.as_slice())
            + std::mem::size_of_val(values.as_slice());
        let mut out: Vec<u8> = Vec::with_capacity(byte_len);

        out.extend_from_slice(MAGIC);
        out.extend_from_slice(self.fingerprint.as_bytes());
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.dimension.to_le_bytes());
        out.extend_from_slice(&(nnz as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::cast_slice(&offsets));
        out.extend_from_slice(bytemuck::cast_slice(&indices));
        out.extend_from_slice(bytemuck::cast_slice(&values));

        debug_assert_eq!(out.len(), byte_len);
        out
    }

    /// Decode a matrix. Returns `None` if the bytes are truncated,
    /// padded, or describe an inconsistent matrix.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
            return None;
        }

        let mut fp = [0u8; FINGERPRINT_LEN];
        fp.copy_from_slice(&bytes[4..4 + FINGERPRINT_LEN]);
        let mut cursor = 4 + FINGERPRINT_LEN;

        let read_u32 = |at: &mut usize| -> Option<u32> {
            let raw = bytes.get(*at..*at + 4)?;
            *at += 4;
            Some(u32::from_le_bytes(raw.try_into().ok()?))
        };
        let row_count = read_u32(&mut cursor)? as usize;
        let dimension = read_u32(&mut cursor)?;
        let nnz = read_u32(&mut cursor)? as usize;

        let expected_len = HEADER_SIZE + (row_count + 1) * 4 + nnz * 8;
        if bytes.len() != expected_len {
            return None;
        }

        let offsets_end = cursor + (row_count + 1) * 4;
        let indices_end = offsets_end + nnz * 4;
        let offsets: Vec<u32> =
            bytemuck::pod_collect_to_vec(&bytes[cursor..offsets_end]);
        let indices: Vec<u32> =
            bytemuck::pod_collect_to_vec(&bytes[offsets_end..indices_end]);
        let values: Vec<f32> =
            bytemuck::pod_collect_to_vec(&bytes[indices_end..]);

        if offsets.first() != Some(&0) || offsets.last() != Some(&(nnz as u32))
        {
            return None;
        }

        let mut rows = Vec::with_capacity(row_count);
        for window in offsets.windows(2) {
            let (start, end) = (window[0] as usize, window[1] as usize);
            if start > end || end > nnz {
                return None;
            }
            let row_indices = &indices[start..end];
            let row_values = &values[start..end];
            let sorted = row_indices.windows(2).all(|w| w[0] < w[1]);
            let in_range = row_indices.iter().all(|&i| i < dimension);
            let finite = row_values.iter().all(|v| v.is_finite());
            if !(sorted && in_range && finite) {
                return None;
            }
            rows.push(SparseVector {
                indices: row_indices.to_vec(),
                values: row_values.to_vec(),
            });
        }

        Some(Self {
            fingerprint: Fingerprint::from_bytes(fp),
            dimension,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    fn sample() -> DocumentMatrix {
        DocumentMatrix::new(
            fp(7),
            5,
            vec![
                SparseVector::from_sorted([(0, 0.6), (3, 0.8)]),
                SparseVector::default(),
                SparseVector::from_sorted([(1, 1.0)]),
            ],
        )
    }

    #[test]
    fn dot_merges_indices() {
        let a = SparseVector::from_sorted([(0, 1.0), (2, 2.0), (5, 3.0)]);
        let b = SparseVector::from_sorted([(2, 4.0), (3, 1.0), (5, 1.0)]);
        assert!((a.dot(&b) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let a = SparseVector::from_sorted([(0, 1.0)]);
        let zero = SparseVector::default();
        assert_eq!(a.cosine(&zero), 0.0);
        assert_eq!(zero.cosine(&zero), 0.0);
    }

    #[test]
    fn normalize_gives_unit_norm() {
        let mut v = SparseVector::from_sorted([(0, 3.0), (1, 4.0)]);
        v.normalize();
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.values[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn bytes_preserve_rows_and_fingerprint() {
        let matrix = sample();
        let decoded = DocumentMatrix::from_bytes(&matrix.to_bytes()).unwrap();
        assert_eq!(decoded, matrix);
        assert_eq!(decoded.fingerprint(), &fp(7));
        assert!(decoded.row(1).unwrap().is_zero());
    }

    #[test]
    fn truncated_bytes_rejected() {
        let bytes = sample().to_bytes();
        assert!(DocumentMatrix::from_bytes(&bytes[..bytes.len() - 1]).is_none());
        assert!(DocumentMatrix::from_bytes(&bytes[..10]).is_none());
        assert!(DocumentMatrix::from_bytes(&[]).is_none());
    }

    #[test]
    fn padded_bytes_rejected() {
        let mut bytes = sample().to_bytes();
        bytes.push(0);
        assert!(DocumentMatrix::from_bytes(&bytes).is_none());
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert!(DocumentMatrix::from_bytes(&bytes).is_none());
    }

    #[test]
    fn out_of_range_index_rejected() {
        let matrix = DocumentMatrix::new(
            fp(1),
            2,
            vec![SparseVector::from_sorted([(4, 1.0)])],
        );
        assert!(DocumentMatrix::from_bytes(&matrix.to_bytes()).is_none());
    }
}
