//! Error kinds surfaced across the library boundary (see spec §7).

/// Everything that can go wrong building or querying a [`crate::group::GlobalGroupSpace`].
#[derive(thiserror::Error, Debug)]
pub enum GenexError {
    /// A distance name was not found in the kernel registry.
    #[error("unknown distance: {0}")]
    UnknownDistance(String),

    /// A query was issued against an index that has not been grouped yet.
    #[error("no groups have been built")]
    NoGroupsBuilt,

    /// A loaded snapshot disagrees with the live dataset's shape.
    #[error("incompatible dataset: expected (n={}, l={}), found (n={}, l={})", expected.0, expected.1, found.0, found.1)]
    IncompatibleDataset {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A subsequence coordinate or length fell outside its valid range.
    #[error("{what} index {index} out of range (bound {bound})")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        bound: usize,
    },

    /// Build or normalize was requested on a dataset with zero rows.
    #[error("dataset is empty")]
    EmptyDataset,

    /// An ingested row contained a `NaN` or infinite value.
    #[error("non-finite value in series {series_index} at position {position}")]
    NonFiniteValue { series_index: usize, position: usize },

    /// Snapshot I/O failed at the filesystem or codec layer.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// Snapshot payload could not be decoded.
    #[error("snapshot decode failure: {0}")]
    DecodeFailure(String),
}

pub type GenexResult<T> = Result<T, GenexError>;

impl From<bincode::Error> for GenexError {
    fn from(e: bincode::Error) -> Self {
        GenexError::DecodeFailure(e.to_string())
    }
}
