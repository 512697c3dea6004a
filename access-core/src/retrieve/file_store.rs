//! Filesystem-backed policy retriever.
//!
//! Policies are stored one per file under `<base>/<version>/<id>`.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::RetrieveError;
use crate::model::{Policy, PolicyIdReference};
use crate::retrieve::PolicyRetriever;

/// Retrieves policy content from a directory hierarchy keyed by version and
/// policy id.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    async fn get_policy(&self, reference: &PolicyIdReference) -> Result<Policy, RetrieveError> {
        let path = self.base_path.join(&reference.version).join(&reference.id);

        let metadata = tokio::fs::metadata(&path).await.map_err(|err| RetrieveError::NotFound {
            id: reference.id.clone(),
            version: reference.version.clone(),
            source: err,
        })?;
        if !metadata.is_file() {
            return Err(RetrieveError::NotAFile {
                id: reference.id.clone(),
                version: reference.version.clone(),
            });
        }

        let content = tokio::fs::read(&path).await.map_err(|err| RetrieveError::Read {
            id: reference.id.clone(),
            version: reference.version.clone(),
            source: err,
        })?;

        Ok(Policy { id: reference.id.clone(), version: reference.version.clone(), content })
    }
}

#[async_trait]
impl PolicyRetriever for FileStore {
    async fn get_policies(&self, refs: &[PolicyIdReference]) -> Result<Vec<Policy>, RetrieveError> {
        let mut policies = Vec::with_capacity(refs.len());
        // One await per load keeps cancellation responsive between policies.
        for reference in refs {
            policies.push(self.get_policy(reference).await?);
        }
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_policy(id: &str, version: &str, content: &[u8]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let version_dir = dir.path().join(version);
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(version_dir.join(id), content).unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn reads_policy_content() {
        let (_dir, store) = store_with_policy("rbac-policy", "v1", b"{\"scope\":\"subject\"}");
        let refs = vec![PolicyIdReference::new("rbac-policy", "v1")];

        let policies = store.get_policies(&refs).await.unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].id, "rbac-policy");
        assert_eq!(policies[0].version, "v1");
        assert_eq!(policies[0].content, b"{\"scope\":\"subject\"}");
    }

    #[tokio::test]
    async fn missing_policy_is_not_found() {
        let (_dir, store) = store_with_policy("rbac-policy", "v1", b"{}");
        let refs = vec![PolicyIdReference::new("ghost", "v1")];

        let err = store.get_policies(&refs).await.unwrap_err();
        assert!(matches!(err, RetrieveError::NotFound { ref id, .. } if id == "ghost"));
    }

    #[tokio::test]
    async fn missing_version_is_not_found() {
        let (_dir, store) = store_with_policy("rbac-policy", "v1", b"{}");
        let refs = vec![PolicyIdReference::new("rbac-policy", "v2")];

        let err = store.get_policies(&refs).await.unwrap_err();
        assert!(matches!(err, RetrieveError::NotFound { ref version, .. } if version == "v2"));
    }

    #[tokio::test]
    async fn directory_at_policy_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("v1").join("rbac-policy")).unwrap();
        let store = FileStore::new(dir.path());
        let refs = vec![PolicyIdReference::new("rbac-policy", "v1")];

        let err = store.get_policies(&refs).await.unwrap_err();
        assert!(matches!(err, RetrieveError::NotAFile { .. }));
        assert!(err.to_string().contains("directory"));
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch() {
        let (_dir, store) = store_with_policy("rbac-policy", "v1", b"{}");
        let refs = vec![
            PolicyIdReference::new("rbac-policy", "v1"),
            PolicyIdReference::new("ghost", "v1"),
        ];

        assert!(store.get_policies(&refs).await.is_err());
    }
}
