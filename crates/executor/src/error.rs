use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Not enough cash available to apply fill. Required: {required}, Available: {available}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("Asset index {0} is outside the group")]
    UnknownAsset(usize),

    #[error("Invalid valuation price {price} for asset index {asset_index}")]
    InvalidPrice { asset_index: usize, price: f64 },

    #[error("An unexpected portfolio state was encountered: {0}")]
    PortfolioError(String),
}
