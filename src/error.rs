pub type PlatemarkResult<T> = Result<T, PlatemarkError>;

#[derive(thiserror::Error, Debug)]
pub enum PlatemarkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset missing: {0}")]
    AssetMissing(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlatemarkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_missing(msg: impl Into<String>) -> Self {
        Self::AssetMissing(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
