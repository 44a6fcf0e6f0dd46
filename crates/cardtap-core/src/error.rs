use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid tag identifier: {0}")]
    InvalidTagId(String),

    #[error("Invalid technology marker: {0:?}")]
    InvalidTechnology(String),
}

pub type Result<T> = std::result::Result<T, Error>;
