use std::collections::HashMap;

use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::{stream, StreamExt};
use s3::config::http::HttpResponse;
use s3::config::{Credentials, Region};
use s3::error::SdkError;
use s3::primitives::ByteStream;
use tracing::{debug, warn};

use super::{check_id, Storage};
use crate::config;
use crate::error::{StorageError, StorageResult};
use crate::models::{valid_id, Paste, PasteMetadata};

const KEY_PREFIX: &str = "pastes/";

// HeadObject requests in flight while listing.
const LIST_CONCURRENCY: usize = 8;

const LANGUAGE_ID: &str = "languageid";
const CREATED_AT: &str = "createdat";
const UPDATED_AT: &str = "updatedat";
const EXPIRES_AT: &str = "expiresat";

/// Stores each paste as one object at `pastes/<id>`: the content is the body
/// and the metadata rides along as user-defined object metadata.
#[derive(Clone)]
pub struct S3Storage {
    client: s3::Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &config::S3Storage) -> StorageResult<Self> {
        let (bucket, region) = config.bucket_and_region()?;

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = &config.endpoint {
            config_loader = config_loader.endpoint_url(endpoint.clone());
        }
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                config_loader = config_loader.credentials_provider(Credentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    None,
                    None,
                    "pastebox",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::config(
                    "S3 access key id and secret access key must be set together",
                ))
            }
        }
        let sdk_config = config_loader.load().await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(S3Storage {
            client: s3::Client::from_conf(s3_config),
            bucket: bucket.to_owned(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Fetch only the metadata of a paste.
    async fn head(&self, id: &str) -> StorageResult<Option<PasteMetadata>> {
        let output = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key(id))
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if reads_as_absent(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(decode_metadata(id, output.metadata()))
    }
}

impl Storage for S3Storage {
    async fn save(&self, paste: &Paste) -> StorageResult<()> {
        check_id(&paste.id)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(&paste.id))
            .content_type("text/plain")
            .set_metadata(Some(encode_metadata(&paste.metadata())))
            .body(ByteStream::from(paste.data.clone().into_bytes()))
            .send()
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Paste>> {
        if !valid_id(id) {
            return Ok(None);
        }

        let object = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(id))
            .send()
            .await
        {
            Ok(object) => object,
            Err(e) if reads_as_absent(&e) => {
                debug!("paste '{id}' not found in bucket '{}'", self.bucket);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(metadata) = decode_metadata(id, object.metadata()) else {
            debug!("paste '{id}' has missing or corrupted metadata");
            return Ok(None);
        };

        let body = object
            .body
            .collect()
            .await
            .map_err(StorageError::s3)?
            .into_bytes();
        match String::from_utf8(body.to_vec()) {
            Ok(data) => Ok(Some(Paste::from_parts(metadata, data))),
            Err(_) => {
                debug!("paste '{id}' is not valid UTF-8");
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        if !valid_id(id) {
            return Ok(());
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key(id))
            .send()
            .await?;
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<PasteMetadata>> {
        let mut ids = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(KEY_PREFIX)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page?;
            ids.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter_map(id_from_key)
                    .map(str::to_owned),
            );
        }

        // the listing carries no user metadata, so every paste costs a HEAD
        let pastes = stream::iter(ids)
            .map(|id| async move {
                let result = self.head(&id).await;
                (id, result)
            })
            .buffer_unordered(LIST_CONCURRENCY)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(Some(metadata)) => Some(metadata),
                    Ok(None) => {
                        debug!("skipping paste '{id}': missing or corrupted metadata");
                        None
                    }
                    Err(e) => {
                        warn!("skipping paste '{id}': {e:?}");
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(pastes)
    }
}

fn object_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX).filter(|id| valid_id(id))
}

/// Missing keys answer 404, or 403 when the caller may not list the bucket.
fn reads_as_absent<E>(error: &SdkError<E, HttpResponse>) -> bool {
    match error {
        SdkError::ServiceError(service) => {
            matches!(service.raw().status().as_u16(), 403 | 404)
        }
        _ => false,
    }
}

fn encode_metadata(metadata: &PasteMetadata) -> HashMap<String, String> {
    HashMap::from([
        (LANGUAGE_ID.to_owned(), metadata.language_id.clone()),
        (CREATED_AT.to_owned(), format_time(&metadata.created_at)),
        (UPDATED_AT.to_owned(), format_time(&metadata.updated_at)),
        (
            EXPIRES_AT.to_owned(),
            metadata
                .expires_at
                .as_ref()
                .map(format_time)
                .unwrap_or_default(),
        ),
    ])
}

fn decode_metadata(id: &str, fields: Option<&HashMap<String, String>>) -> Option<PasteMetadata> {
    let fields = fields?;
    let expires_at = match fields.get(EXPIRES_AT).map(String::as_str) {
        None | Some("") => None,
        Some(value) => Some(parse_time(value)?),
    };

    Some(PasteMetadata {
        id: id.to_owned(),
        language_id: fields.get(LANGUAGE_ID)?.clone(),
        created_at: parse_time(fields.get(CREATED_AT)?)?,
        updated_at: parse_time(fields.get(UPDATED_AT)?)?,
        expires_at,
    })
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod fake;
