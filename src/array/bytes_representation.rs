use derive_more::Display;

/// The size of encoded bytes, as far as it can be known before encoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum BytesRepresentation {
    /// The encoded size is exactly known.
    #[display("fixed size: {_0}")]
    FixedSize(u64),
    /// The encoded size has an upper bound.
    #[display("bounded size: {_0}")]
    BoundedSize(u64),
    /// The encoded size cannot be determined in advance.
    #[display("unbounded size")]
    UnboundedSize,
}

impl BytesRepresentation {
    /// Return the fixed or bounded size, or [`None`] if the size is unbounded.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        match self {
            Self::FixedSize(size) | Self::BoundedSize(size) => Some(*size),
            Self::UnboundedSize => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_representation_size() {
        assert_eq!(BytesRepresentation::FixedSize(16).size(), Some(16));
        assert_eq!(BytesRepresentation::BoundedSize(20).size(), Some(20));
        assert_eq!(BytesRepresentation::UnboundedSize.size(), None);
        assert_eq!(
            BytesRepresentation::BoundedSize(20).to_string(),
            "bounded size: 20"
        );
    }
}
