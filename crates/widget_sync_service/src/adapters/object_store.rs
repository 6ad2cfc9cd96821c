use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use super::{block_on, StoreError};

pub trait ObjectStore {
    fn put_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError>;

    /// Returns `None` when no object exists at `key`.
    fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Deleting a missing key succeeds.
    fn delete_object(&self, key: &str) -> Result<(), StoreError>;

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Object store backed by a single S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn target(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()));

        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                StoreError::backend("put_object", self.target(key), DisplayErrorContext(error))
            })
    }

    fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let request = self.client.get_object().bucket(&self.bucket).key(key);

        block_on(async move {
            let output = match request.send().await {
                Ok(output) => output,
                Err(error)
                    if error
                        .as_service_error()
                        .map(|service_error| service_error.is_no_such_key())
                        .unwrap_or(false) =>
                {
                    return Ok(None);
                }
                Err(error) => {
                    return Err(StoreError::backend(
                        "get_object",
                        self.target(key),
                        DisplayErrorContext(error),
                    ));
                }
            };

            output
                .body
                .collect()
                .await
                .map(|bytes| Some(bytes.into_bytes().to_vec()))
                .map_err(|error| StoreError::backend("get_object", self.target(key), error))
        })
    }

    fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        let request = self.client.delete_object().bucket(&self.bucket).key(key);

        block_on(async move { request.send().await })
            .map(|_| ())
            .map_err(|error| {
                StoreError::backend(
                    "delete_object",
                    self.target(key),
                    DisplayErrorContext(error),
                )
            })
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
            .into_paginator()
            .send();

        block_on(async move {
            let mut keys = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(|error| {
                    StoreError::backend(
                        "list_objects_v2",
                        self.target(prefix),
                        DisplayErrorContext(error),
                    )
                })?;
                keys.extend(
                    page.contents()
                        .iter()
                        .filter_map(|object| object.key())
                        .map(str::to_string),
                );
            }
            Ok(keys)
        })
    }
}
