//! [`RemoteStore`] backed by the Yandex Disk REST API.
//!
//! The service addresses resources by path, so a container id is simply its
//! canonical disk path (`disk:/Archive/proj`).

use std::path::Path;

use diskmirror_core::{DiskClient, DiskError, ROOT_PATH, Resource, ResourceType};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::remote::{EntryInfo, EntryKind, RemoteEntry, RemoteError, RemoteStore, ServiceHealth};
use super::transfer::{TransferClient, TransferError};

const ROOT_PAGE_SIZE: u32 = 200;

#[derive(Clone)]
pub struct DiskRemote {
    client: DiskClient,
    transfer: TransferClient,
}

impl DiskRemote {
    pub fn new(client: DiskClient) -> Self {
        Self {
            client,
            transfer: TransferClient::new(),
        }
    }

    pub fn with_transfer(mut self, transfer: TransferClient) -> Self {
        self.transfer = transfer;
        self
    }
}

impl RemoteStore for DiskRemote {
    async fn about(&self) -> Result<ServiceHealth, RemoteError> {
        let info = self.client.get_disk_info().await.map_err(api_error)?;
        Ok(ServiceHealth {
            total_space: info.total_space,
            used_space: info.used_space,
        })
    }

    async fn list(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<Vec<RemoteEntry>, RemoteError> {
        match parent {
            Some(parent) => {
                let found = self
                    .client
                    .find_resource(&child_path(parent, name))
                    .await
                    .map_err(api_error)?;
                Ok(found
                    .map(|resource| entry_from_resource(resource, Some(parent.to_string())))
                    .into_iter()
                    .collect())
            }
            None => {
                let items = self
                    .client
                    .list_directory_all(ROOT_PATH, ROOT_PAGE_SIZE)
                    .await
                    .map_err(api_error)?;
                Ok(items
                    .into_iter()
                    .filter(|item| item.name == name)
                    .map(|item| entry_from_resource(item, Some(ROOT_PATH.to_string())))
                    .collect())
            }
        }
    }

    async fn info(&self, id: &str) -> Result<EntryInfo, RemoteError> {
        let resource = self.client.get_resource(id).await.map_err(api_error)?;
        Ok(EntryInfo {
            parent_id: parent_path(&resource.path),
            path: resource.path,
        })
    }

    async fn mkdir(&self, parent: Option<&str>, name: &str) -> Result<String, RemoteError> {
        let path = child_path(parent.unwrap_or(ROOT_PATH), name);
        self.client.create_folder(&path).await.map_err(api_error)?;
        Ok(path)
    }

    async fn upload(&self, local_path: &Path, parent_id: &str) -> Result<(), RemoteError> {
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RemoteError::Failed(format!("{} has no file name", local_path.display()))
            })?;
        let target = child_path(parent_id, &name);
        let link = self
            .client
            .get_upload_link(&target, false)
            .await
            .map_err(api_error)?;
        self.transfer
            .upload_from_path(link.href.as_str(), local_path)
            .await
            .map_err(transfer_error)?;
        Ok(())
    }
}

fn entry_from_resource(resource: Resource, parent_id: Option<String>) -> RemoteEntry {
    RemoteEntry {
        modified: parse_modified(resource.modified.as_deref()),
        kind: match resource.resource_type {
            ResourceType::File => EntryKind::File,
            ResourceType::Dir => EntryKind::Directory,
        },
        path: Some(resource.path.clone()),
        id: resource.path,
        name: resource.name,
        parent_id,
    }
}

fn parse_modified(value: Option<&str>) -> Option<i64> {
    let value = value?;
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .map(|parsed| parsed.unix_timestamp())
}

pub(crate) fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// `disk:/A/B` -> `disk:/A`, `disk:/A` -> `disk:/`, root -> `None`.
pub(crate) fn parent_path(path: &str) -> Option<String> {
    let (head, tail) = path.trim_end_matches('/').rsplit_once('/')?;
    if tail.is_empty() {
        return None;
    }
    if head.is_empty() || head.ends_with(':') {
        return Some(format!("{head}/"));
    }
    Some(head.to_string())
}

fn api_error(err: DiskError) -> RemoteError {
    if err.is_retryable() {
        RemoteError::Transient(err.to_string())
    } else {
        RemoteError::Failed(err.to_string())
    }
}

fn transfer_error(err: TransferError) -> RemoteError {
    if err.is_retryable() {
        RemoteError::Transient(err.to_string())
    } else {
        RemoteError::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_child_paths() {
        assert_eq!(child_path("disk:/", "Archive"), "disk:/Archive");
        assert_eq!(child_path("disk:/Archive", "proj"), "disk:/Archive/proj");
    }

    #[test]
    fn derives_parent_paths() {
        assert_eq!(
            parent_path("disk:/Archive/proj").as_deref(),
            Some("disk:/Archive")
        );
        assert_eq!(parent_path("disk:/Archive").as_deref(), Some("disk:/"));
        assert_eq!(parent_path("disk:/"), None);
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        assert_eq!(parse_modified(Some("1970-01-01T00:01:00Z")), Some(60));
        assert_eq!(parse_modified(Some("yesterday")), None);
        assert_eq!(parse_modified(None), None);
    }
}
