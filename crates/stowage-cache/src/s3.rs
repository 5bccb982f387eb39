//! S3-compatible object store.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream as SdkByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use stowage_core::{
    ByteStream, Error, ObjectDescriptor, ObjectStore, RemoteObject, Result, S3ClientConfig,
};
use tracing::{debug, warn};

/// Size of each part of a multipart upload.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Object store bound to one S3 bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration, overridden by
    /// `client_config` where set.
    pub async fn from_config(
        bucket: impl Into<String>,
        client_config: Option<&S3ClientConfig>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        let mut force_path_style = None;

        if let Some(config) = client_config {
            if let Some(region) = &config.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(endpoint) = &config.endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            if let Some(creds) = &config.credentials {
                loader = loader.credentials_provider(Credentials::new(
                    &creds.access_key_id,
                    &creds.secret_access_key,
                    creds.session_token.clone(),
                    None,
                    "stowage",
                ));
            }
            force_path_style = config.force_path_style;
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(path_style) = force_path_style {
            builder = builder.force_path_style(path_style);
        }
        Self::new(Client::from_conf(builder.build()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn put_single(&self, key: &str, content_type: &str, data: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(data.len() as i64)
            .body(SdkByteStream::from(data))
            .send()
            .await
            .map_err(|e| s3_error("PutObject", key, e))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        content_type: &str,
        first: Bytes,
        parts: &mut PartReader,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| s3_error("CreateMultipartUpload", key, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::Transport(format!("No upload id returned for {}", key)))?
            .to_string();

        match self.upload_parts(key, &upload_id, first, parts).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key,
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(&abort),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first: Bytes,
        parts: &mut PartReader,
    ) -> Result<()> {
        let mut completed = Vec::new();
        let mut next = Some(first);
        let mut part_number = 1;

        while let Some(data) = next {
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(data.len() as i64)
                .body(SdkByteStream::from(data))
                .send()
                .await
                .map_err(|e| s3_error("UploadPart", key, e))?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            debug!(key, part_number, "Uploaded part");

            part_number += 1;
            next = parts.next_part().await?;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| s3_error("CompleteMultipartUpload", key, e))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<RemoteObject>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(s3_error("GetObject", key, e)),
        };

        let descriptor = ObjectDescriptor {
            content_length: output.content_length().and_then(|l| u64::try_from(l).ok()),
        };
        Ok(Some(RemoteObject {
            descriptor,
            body: sdk_body_stream(output.body),
        }))
    }

    async fn put_object(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()> {
        let mut parts = PartReader::new(body, PART_SIZE);
        let first = parts.next_part().await?.unwrap_or_default();

        if parts.is_finished() {
            return self.put_single(key, content_type, first).await;
        }
        self.put_multipart(key, content_type, first, &mut parts).await
    }

    fn name(&self) -> &str {
        "s3"
    }
}

/// Cuts a byte stream into fixed-size parts; only the last may be shorter.
pub struct PartReader {
    body: ByteStream,
    buf: BytesMut,
    part_size: usize,
    exhausted: bool,
}

impl PartReader {
    pub fn new(body: ByteStream, part_size: usize) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            part_size,
            exhausted: false,
        }
    }

    /// Next part, or `None` once the body is drained.
    pub async fn next_part(&mut self) -> Result<Option<Bytes>> {
        while !self.exhausted && self.buf.len() < self.part_size {
            match self.body.next().await {
                Some(chunk) => self.buf.extend_from_slice(&chunk?),
                None => self.exhausted = true,
            }
        }
        if self.buf.is_empty() {
            return Ok(None);
        }
        let len = self.buf.len().min(self.part_size);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Whether every byte of the body has been handed out.
    pub fn is_finished(&self) -> bool {
        self.exhausted && self.buf.is_empty()
    }
}

fn sdk_body_stream(body: SdkByteStream) -> ByteStream {
    Box::pin(futures::stream::unfold(body, |mut body| async move {
        let chunk = body.next().await?;
        Some((
            chunk.map_err(|e| Error::Transport(format!("Failed to read object body: {}", e))),
            body,
        ))
    }))
}

fn is_not_found(err: &SdkError<GetObjectError, HttpResponse>) -> bool {
    if let Some(service) = err.as_service_error() {
        if service.is_no_such_key() {
            return true;
        }
    }
    err.raw_response()
        .is_some_and(|r| r.status().as_u16() == 404)
}

fn s3_error<E, R>(operation: &str, key: &str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    Error::Transport(format!(
        "S3 {} failed for {}: {}",
        operation,
        key,
        DisplayErrorContext(&err)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(sizes: &[usize]) -> ByteStream {
        let chunks: Vec<Result<Bytes>> = sizes
            .iter()
            .enumerate()
            .map(|(i, n)| Ok(Bytes::from(vec![i as u8; *n])))
            .collect();
        Box::pin(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_part_reader_cuts_fixed_parts() {
        let mut parts = PartReader::new(body(&[3, 3, 3]), 4);

        let mut sizes = Vec::new();
        while let Some(part) = parts.next_part().await.unwrap() {
            sizes.push(part.len());
        }
        assert_eq!(sizes, vec![4, 4, 1]);
        assert!(parts.is_finished());
    }

    #[tokio::test]
    async fn test_part_reader_single_part() {
        let mut parts = PartReader::new(body(&[2, 1]), 4);

        let first = parts.next_part().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), &[0, 0, 1]);
        assert!(parts.is_finished());
    }

    #[tokio::test]
    async fn test_part_reader_exact_boundary_is_not_finished_early() {
        let mut parts = PartReader::new(body(&[4, 4]), 4);

        assert_eq!(parts.next_part().await.unwrap().unwrap().len(), 4);
        assert!(!parts.is_finished());
        assert_eq!(parts.next_part().await.unwrap().unwrap().len(), 4);
        assert!(parts.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_part_reader_empty_body() {
        let mut parts = PartReader::new(body(&[]), 4);
        assert!(parts.next_part().await.unwrap().is_none());
        assert!(parts.is_finished());
    }

    #[tokio::test]
    async fn test_part_reader_propagates_body_error() {
        let failing: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(Error::Archive("Failed to pack dist".into())),
        ]));
        let mut parts = PartReader::new(failing, 4);
        assert!(matches!(parts.next_part().await, Err(Error::Archive(_))));
    }

    #[tokio::test]
    async fn test_sdk_body_stream_yields_all_bytes() {
        let mut stream = sdk_body_stream(SdkByteStream::from_static(b"tar bytes"));
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(out, b"tar bytes");
    }
}
