//! s3tree-s3: aws-sdk-s3 adapter for s3tree
//!
//! Implements the [`s3tree_core::ObjectStore`] trait on top of the AWS SDK
//! and plugs the core transport policy into the SDK request pipeline.

mod client;
mod interceptor;

pub use client::S3Client;
pub use interceptor::PolicyInterceptor;
