#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod histogram;
pub mod ops;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("tags and values must have the same length (tags {tags}, values {values})")]
    TagCountMismatch { tags: usize, values: usize },
    #[error("sample {index} is not finite ({value})")]
    NonFiniteSample { index: usize, value: f64 },
    #[error("summaries contain duplicate tag: {tag}")]
    DuplicateTag { tag: String },
    #[error("failed to parse input as a serialized summary: {0}")]
    MalformedSummary(#[from] prost::DecodeError),
    #[error("invalid bucket limits: {0}")]
    InvalidBucketLimits(&'static str),
}
