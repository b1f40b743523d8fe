//! JSON 文档存储
//! R2 / S3 兼容存储或本地目录，整份覆盖写入

use crate::config::StorageConfig;
use crate::types::{CollectionDocument, ContentItem};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::ObjectStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("文件不存在: {0}")]
    NotFound(String),
    #[error("存储错误: {0}")]
    Backend(#[from] object_store::Error),
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("创建目录失败: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl BlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let inner: Arc<dyn ObjectStore> = match config {
            StorageConfig::R2 {
                bucket,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                info!("🪣 使用 R2 存储: {}", bucket);
                Arc::new(
                    AmazonS3Builder::new()
                        .with_bucket_name(bucket)
                        .with_endpoint(endpoint)
                        .with_region("auto")
                        .with_access_key_id(access_key_id)
                        .with_secret_access_key(secret_access_key)
                        .build()?,
                )
            }
            StorageConfig::Local { dir } => {
                std::fs::create_dir_all(dir)?;
                info!("📁 使用本地存储: {}", dir.display());
                Arc::new(LocalFileSystem::new_with_prefix(dir)?)
            }
        };
        Ok(Self::new(inner))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub async fn put_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.inner
            .put(&ObjPath::from(name), Bytes::from(body).into())
            .await?;
        Ok(())
    }

    /// 原样读取
    pub async fn get_raw(&self, name: &str) -> Result<Bytes, StorageError> {
        let result = match self.inner.get(&ObjPath::from(name)).await {
            Ok(r) => r,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(result.bytes().await?)
    }

    /// 写入热榜文档，`count` 与 `lastUpdated` 在此生成
    pub async fn save_collection<T: Serialize>(
        &self,
        name: &str,
        platform: &str,
        kind: &str,
        items: &[T],
    ) -> Result<(), StorageError> {
        let document = CollectionDocument {
            platform: platform.to_string(),
            kind: kind.to_string(),
            count: items.len(),
            last_updated: crate::reconcile::crawl_timestamp(),
            data: items.iter().collect::<Vec<&T>>(),
        };
        self.put_json(name, &document).await
    }

    pub async fn load_document<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<CollectionDocument<T>, StorageError> {
        let raw = self.get_raw(name).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// 读取条目，不存在或损坏时返回空列表
    pub async fn load_items(&self, name: &str) -> Vec<ContentItem> {
        match self.load_document::<ContentItem>(name).await {
            Ok(doc) => doc.data,
            Err(StorageError::NotFound(_)) => Vec::new(),
            Err(e) => {
                warn!("读取 {} 失败: {}", name, e);
                Vec::new()
            }
        }
    }

    pub async fn last_updated(&self, name: &str) -> Option<String> {
        let raw = self.get_raw(name).await.ok()?;
        let value: serde_json::Value = serde_json::from_slice(&raw).ok()?;
        value["lastUpdated"].as_str().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn sample(id: u64) -> ContentItem {
        ContentItem {
            title: format!("t{}", id),
            tmdb_id: id,
            vote_average: Some(7.5),
            poster_path: Some("/p.jpg".to_string()),
            backdrop_path: None,
            genre_ids: vec![18],
            media_type: MediaKind::Tv,
            release_date: None,
            first_air_date: Some("2024-01-01".to_string()),
            overview: Some("...".to_string()),
            crawled_at: "2025-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_collection() {
        let store = BlobStore::in_memory();
        store
            .save_collection("douban-tv.json", "douban", "tv_series", &[sample(1), sample(2)])
            .await
            .unwrap();

        let doc = store
            .load_document::<ContentItem>("douban-tv.json")
            .await
            .unwrap();
        assert_eq!(doc.platform, "douban");
        assert_eq!(doc.kind, "tv_series");
        assert_eq!(doc.count, 2);
        assert_eq!(doc.data[1].tmdb_id, 2);

        let raw = store.get_raw("douban-tv.json").await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["type"], "tv_series");
        assert!(value["lastUpdated"].is_string());
        assert_eq!(value["data"][0]["tmdbId"], 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_document() {
        let store = BlobStore::in_memory();
        store
            .save_collection("x.json", "bilibili", "anime", &[sample(1), sample(2)])
            .await
            .unwrap();
        store
            .save_collection("x.json", "bilibili", "anime", &[sample(3)])
            .await
            .unwrap();

        let items = store.load_items("x.json").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tmdb_id, 3);
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = BlobStore::in_memory();
        assert!(matches!(
            store.get_raw("nope.json").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.load_items("nope.json").await.is_empty());
        assert!(store.last_updated("nope.json").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_blob_loads_empty() {
        let store = BlobStore::in_memory();
        store.put_json("bad.json", &serde_json::json!({"oops": true})).await.unwrap();
        assert!(store.load_items("bad.json").await.is_empty());
    }

    #[tokio::test]
    async fn test_last_updated() {
        let store = BlobStore::in_memory();
        store
            .save_collection("m.json", "douban", "movie", &[sample(1)])
            .await
            .unwrap();
        let ts = store.last_updated("m.json").await.unwrap();
        assert!(ts.ends_with('Z'));
    }
}
