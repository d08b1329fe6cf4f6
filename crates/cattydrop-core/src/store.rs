//! 文件存储
//!
//! 上传的字节流落盘到上传目录，元数据保存在内存注册表中。
//!
//! # 不变式
//!
//! 注册表中存在记录 **当且仅当** 磁盘上存在对应 blob：
//! - 写入：blob 完整落盘并改名之后才插入记录
//! - 删除：先移除记录，再删除 blob
//!
//! 磁盘文件名只使用服务端生成的 storage key（UUID v4），
//! 客户端提供的文件名绝不参与路径拼接，只作为展示元数据保存。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notify::{Event, Notifier};

/// 正在写入中的 blob 的文件名后缀
pub const PART_SUFFIX: &str = ".part";

const COPY_BUF_SIZE: usize = 64 * 1024;

/// 存储操作错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file not found")]
    NotFound,
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("storage write failed: {0}")]
    StorageWrite(#[from] std::io::Error),
}

/// 一个已上传文件的元数据
///
/// 序列化为 camelCase 并附带由 storage_key 推导的 `downloadURL`。
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// 服务端生成的不透明标识，同时是磁盘上的文件名
    pub storage_key: String,
    /// 客户端提供的文件名，仅作展示和下载建议名
    pub original_name: String,
    /// 落盘后实际写入的字节数
    pub size_bytes: u64,
    /// 上传完成时间，保留期清理据此判断过期
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// 下载地址由 storage_key 推导，不单独存储
    pub fn download_url(&self) -> String {
        format!("/download/{}", self.storage_key)
    }
}

impl Serialize for FileRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FileRecord", 5)?;
        s.serialize_field("storageKey", &self.storage_key)?;
        s.serialize_field("originalName", &self.original_name)?;
        s.serialize_field("sizeBytes", &self.size_bytes)?;
        s.serialize_field("uploadedAt", &self.uploaded_at)?;
        s.serialize_field("downloadURL", &self.download_url())?;
        s.end()
    }
}

/// 文件存储：上传目录 + 内存注册表
///
/// 注册表由互斥锁保护；blob 读写在锁外进行，
/// 避免慢速磁盘 I/O 串行化所有注册表访问。
pub struct FileStore {
    upload_dir: PathBuf,
    max_bytes: u64,
    registry: Mutex<HashMap<String, FileRecord>>,
    notifier: Notifier,
}

impl FileStore {
    /// 打开存储，上传目录不存在时创建
    pub async fn open(
        upload_dir: impl Into<PathBuf>,
        max_bytes: u64,
        notifier: Notifier,
    ) -> anyhow::Result<Self> {
        let upload_dir = upload_dir.into();
        fs::create_dir_all(&upload_dir).await?;
        Ok(Self {
            upload_dir,
            max_bytes,
            registry: Mutex::new(HashMap::new()),
            notifier,
        })
    }

    fn blob_path(&self, storage_key: &str) -> PathBuf {
        self.upload_dir.join(storage_key)
    }

    /// 写入一个上传流并登记记录
    ///
    /// 先写到 `<key>.part`，完整后改名为 `<key>`，再插入注册表。
    /// 任何失败路径都会清掉写了一半的 blob。
    pub async fn put<R>(&self, original_name: &str, reader: &mut R) -> Result<FileRecord, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let storage_key = Uuid::new_v4().to_string();
        let part_path = self.upload_dir.join(format!("{storage_key}{PART_SUFFIX}"));

        let size_bytes = match self.write_blob(&part_path, reader).await {
            Ok(written) => written,
            Err(e) => {
                remove_quietly(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&part_path, self.blob_path(&storage_key)).await {
            remove_quietly(&part_path).await;
            return Err(StoreError::StorageWrite(e));
        }

        let record = FileRecord {
            storage_key: storage_key.clone(),
            original_name: sanitize_name(original_name),
            size_bytes,
            uploaded_at: Utc::now(),
        };

        // 插入与事件发布在同一临界区内，保证广播顺序等于提交顺序
        {
            let mut registry = self.registry.lock().await;
            registry.insert(storage_key, record.clone());
            self.notifier.publish(Event::FileUploaded(record.clone()));
        }

        info!(
            "Stored {} ({} bytes) as {}",
            record.original_name, record.size_bytes, record.storage_key
        );
        Ok(record)
    }

    async fn write_blob<R>(&self, path: &Path, reader: &mut R) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = File::create(path).await?;
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            written += n as u64;
            if written > self.max_bytes {
                return Err(StoreError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&buf[..n]).await?;
        }
        file.flush().await?;
        Ok(written)
    }

    /// 打开一个 blob 供读取，记录或 blob 缺失都报 `NotFound`
    pub async fn get(&self, storage_key: &str) -> Result<(FileRecord, File), StoreError> {
        let record = {
            let registry = self.registry.lock().await;
            registry.get(storage_key).cloned()
        }
        .ok_or(StoreError::NotFound)?;

        match File::open(self.blob_path(storage_key)).await {
            Ok(file) => Ok((record, file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::StorageWrite(e)),
        }
    }

    /// 删除记录和 blob
    ///
    /// 先移除记录（同时发布事件），再删 blob。记录不存在时报
    /// `NotFound` —— 清理任务和用户删除竞争时，输掉的一方拿到
    /// 的就是这个错误。
    pub async fn delete(&self, storage_key: &str) -> Result<(), StoreError> {
        {
            let mut registry = self.registry.lock().await;
            if registry.remove(storage_key).is_none() {
                return Err(StoreError::NotFound);
            }
            self.notifier.publish(Event::FileDeleted {
                storage_key: storage_key.to_string(),
            });
        }

        // 记录已经移除，blob 缺失只记日志，不当作错误
        if let Err(e) = fs::remove_file(self.blob_path(storage_key)).await {
            warn!("Blob for {} already gone: {}", storage_key, e);
        }
        Ok(())
    }

    /// 当前所有记录的快照，按上传时间排序
    pub async fn list(&self) -> Vec<FileRecord> {
        let registry = self.registry.lock().await;
        let mut records: Vec<FileRecord> = registry.values().cloned().collect();
        records.sort_by_key(|r| r.uploaded_at);
        records
    }

    /// 驱逐超过保留期的记录，返回删除数量
    ///
    /// 逐条走 [`delete`](Self::delete) 的完整契约，单条失败只记日志。
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let expired: Vec<String> = {
            let registry = self.registry.lock().await;
            registry
                .values()
                .filter(|r| r.uploaded_at < cutoff)
                .map(|r| r.storage_key.clone())
                .collect()
        };

        let mut evicted = 0;
        for storage_key in expired {
            match self.delete(&storage_key).await {
                Ok(()) => {
                    debug!("Evicted expired file {}", storage_key);
                    evicted += 1;
                }
                // 清理期间被用户并发删除，正常情况
                Err(StoreError::NotFound) => {
                    debug!("{} deleted concurrently during sweep", storage_key);
                }
                Err(e) => warn!("Failed to evict {}: {}", storage_key, e),
            }
        }
        evicted
    }

    /// 清理上传目录中没有对应记录的孤儿 blob
    ///
    /// 覆盖两种情况：进程重启后遗留的上一轮上传（注册表只在内存），
    /// 以及中断上传留下的 `.part` 文件。`older_than` 之内有改动的
    /// 文件会被跳过，以免误删正在写入的上传。
    pub async fn remove_orphans(&self, older_than: Duration) -> anyhow::Result<usize> {
        let cutoff = std::time::SystemTime::now() - older_than.to_std().unwrap_or_default();
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.upload_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let storage_key = name.strip_suffix(PART_SUFFIX).unwrap_or(name.as_str());
            {
                let registry = self.registry.lock().await;
                if registry.contains_key(storage_key) {
                    continue;
                }
            }
            let modified = entry.metadata().await?.modified()?;
            if modified > cutoff {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    info!("Removed orphaned blob {}", name);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphan {}: {}", name, e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
impl FileStore {
    /// 测试辅助：直接塞一条记录，跳过落盘
    pub(crate) async fn insert_record(&self, record: FileRecord) {
        let mut registry = self.registry.lock().await;
        registry.insert(record.storage_key.clone(), record);
    }
}

/// 客户端文件名仅作展示用：剥掉路径成分，空名回退到占位符
fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to clean up partial blob {:?}: {}", path, e);
        }
    }
}
