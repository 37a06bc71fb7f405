use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Price panel is empty: {0}")]
    Empty(String),

    #[error("Timestamp index is not strictly increasing at position {0}")]
    UnorderedIndex(usize),

    #[error("Column '{symbol}' has {actual} rows but the index has {expected}")]
    LengthMismatch { symbol: String, expected: usize, actual: usize },

    #[error("Asset '{0}' appears more than once")]
    DuplicateAsset(String),

    #[error("Asset '{0}' is not part of the panel")]
    UnknownAsset(String),

    #[error("Missing price for '{symbol}' at row {row}")]
    MissingPrice { symbol: String, row: usize },

    #[error("Invalid price {price} for '{symbol}' at row {row}; prices must be finite and positive")]
    InvalidPrice { symbol: String, row: usize, price: f64 },

    #[error("Signal data error: {0}")]
    Signals(String),

    #[error("Failed to read data file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse data file: {0}")]
    Json(#[from] serde_json::Error),
}
