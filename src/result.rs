use crate::SwapError;

pub type SwapResult<T> = std::result::Result<T, SwapError>;
