use std::path::{Path, PathBuf};

use crate::error::{DroverError, Result};
use crate::job::Job;

// Concurrent invocations race the max-id scan; exclusive directory
// creation decides the winner, the loser rescans.
const CREATE_ATTEMPTS: usize = 16;

/// The set of job records backed by one directory. Stateless between
/// calls: every operation is a fresh scan of the directory contents.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Open the registry at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| DroverError::storage("create", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scan_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| DroverError::storage("read", &self.root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DroverError::storage("read", &self.root, e))?
        {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|&id| id > 0)
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Next free id: one more than the highest existing record, 1 when the
    /// registry is empty. Gaps from deletions are never refilled.
    pub async fn next_id(&self) -> Result<u64> {
        let ids = self.scan_ids().await?;
        Ok(ids.last().map(|m| m + 1).unwrap_or(1))
    }

    /// All records, ascending by id. An empty registry is an empty list.
    pub async fn list(&self) -> Result<Vec<Job>> {
        let ids = self.scan_ids().await?;
        Ok(ids
            .into_iter()
            .map(|id| Job::new(id, self.root.join(id.to_string())))
            .collect())
    }

    /// Record with exactly this id, if its directory exists.
    pub async fn get(&self, id: u64) -> Option<Job> {
        let dir = self.root.join(id.to_string());
        tokio::fs::metadata(&dir)
            .await
            .ok()?
            .is_dir()
            .then(|| Job::new(id, dir))
    }

    /// Match `alias` against record ids first, then against names. On a
    /// name collision the highest id wins.
    pub async fn resolve(&self, alias: &str) -> Result<Job> {
        let ids = self.scan_ids().await?;
        if let Some(&id) = ids.iter().find(|id| id.to_string() == alias) {
            return Ok(Job::new(id, self.root.join(alias)));
        }

        let mut by_name = None;
        for id in ids {
            let job = Job::new(id, self.root.join(id.to_string()));
            if job.name().await.as_deref() == Some(alias) {
                by_name = Some(job);
            }
        }
        by_name.ok_or_else(|| DroverError::NotFound(alias.to_string()))
    }

    /// Allocate the next id and create its backing directory. The
    /// exclusive `create_dir` is the allocation act itself.
    pub async fn create(&self, command: &str, name: Option<&str>) -> Result<Job> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            for job in self.list().await? {
                if job.name().await.as_deref() == Some(name) {
                    return Err(DroverError::NameTaken(name.to_string()));
                }
            }
        }

        let mut claimed = None;
        for _ in 0..CREATE_ATTEMPTS {
            let id = self.next_id().await?;
            let dir = self.root.join(id.to_string());
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {
                    claimed = Some(Job::new(id, dir));
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(DroverError::storage("create", &dir, e)),
            }
        }
        let Some(job) = claimed else {
            return Err(DroverError::storage(
                "allocate id under",
                &self.root,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "kept losing the id race",
                ),
            ));
        };

        job.write_command(command).await?;
        if let Some(name) = name {
            job.write_name(name).await?;
        }
        tracing::debug!(id = job.id(), "created job record");
        Ok(job)
    }

    /// Remove the record's backing directory. Deleting an already-deleted
    /// record is a no-op; returns whether anything was removed.
    pub async fn delete(&self, job: &Job) -> Result<bool> {
        match tokio::fs::remove_dir_all(job.dir()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DroverError::storage("remove", job.dir(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_start_at_one_and_skip_junk() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::open(root.path()).await.unwrap();
        assert_eq!(registry.next_id().await.unwrap(), 1);

        tokio::fs::create_dir(root.path().join("17")).await.unwrap();
        tokio::fs::create_dir(root.path().join("notes")).await.unwrap();
        tokio::fs::write(root.path().join("9"), b"a file, not a record")
            .await
            .unwrap();

        assert_eq!(registry.next_id().await.unwrap(), 18);
        let ids: Vec<u64> = registry
            .list()
            .await
            .unwrap()
            .iter()
            .map(|j| j.id())
            .collect();
        assert_eq!(ids, vec![17]);
    }

    #[tokio::test]
    async fn gaps_are_never_refilled() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::open(root.path()).await.unwrap();
        for cmd in ["sleep 1", "sleep 2", "sleep 3"] {
            registry.create(cmd, None).await.unwrap();
        }
        let middle = registry.get(2).await.unwrap();
        assert!(registry.delete(&middle).await.unwrap());
        assert_eq!(registry.next_id().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::open(root.path()).await.unwrap();
        let job = registry.create("true", None).await.unwrap();

        assert!(registry.delete(&job).await.unwrap());
        assert!(!registry.delete(&job).await.unwrap());
        assert!(registry.get(job.id()).await.is_none());
    }

    #[tokio::test]
    async fn create_rejects_taken_name() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::open(root.path()).await.unwrap();
        let first = registry.create("sleep 1", Some("dup")).await.unwrap();

        let err = registry.create("sleep 2", Some("dup")).await.unwrap_err();
        assert!(matches!(err, DroverError::NameTaken(_)));

        registry.delete(&first).await.unwrap();
        registry.create("sleep 2", Some("dup")).await.unwrap();
    }

    #[tokio::test]
    async fn blank_names_are_dropped() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::open(root.path()).await.unwrap();
        let job = registry.create("true", Some("   ")).await.unwrap();
        assert_eq!(job.name().await, None);
    }
}
