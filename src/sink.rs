//! Persistence Sink - 让 pointer 文件对外可见
//!
//! 发布流程只依赖 "成功 / 失败" 两种结果；git 的 clone、add、commit、push 细节都封装在这里。

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// 持久化交接
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// 启动时调用一次（例如 clone 仓库、设置提交者）
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// 让已经写好的 artifact 持久且对外可见
    async fn persist(&self, artifact: &Path) -> Result<()>;
}

/// 不做任何事的 Sink（pointer 文件由本机其他进程直接读取时使用）
#[derive(Debug, Default, Clone)]
pub struct NullSink;

#[async_trait]
impl PersistenceSink for NullSink {
    async fn persist(&self, artifact: &Path) -> Result<()> {
        tracing::debug!("NullSink: {:?} 保持在本地", artifact);
        Ok(())
    }
}

#[cfg(feature = "git")]
pub use git::GitSink;

#[cfg(feature = "git")]
mod git {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use git2::build::RepoBuilder;
    use git2::{Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature};

    use super::PersistenceSink;
    use crate::config::RepoConfig;
    use crate::error::{Error, Result};

    /// 提交信息
    const COMMIT_MESSAGE: &str = "set new youtube video id";

    /// 通过 git 远程仓库发布 pointer 文件
    #[derive(Debug, Clone)]
    pub struct GitSink {
        repo_dir: PathBuf,
        config: RepoConfig,
    }

    impl GitSink {
        pub fn new<P: Into<PathBuf>>(repo_dir: P, config: RepoConfig) -> Self {
            Self {
                repo_dir: repo_dir.into(),
                config,
            }
        }

        pub fn repo_dir(&self) -> &Path {
            &self.repo_dir
        }

        fn callbacks(&self) -> RemoteCallbacks<'_> {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(move |_url, username_from_url, _allowed| {
                let user = if self.config.user.is_empty() {
                    username_from_url.unwrap_or("git")
                } else {
                    self.config.user.as_str()
                };
                Cred::userpass_plaintext(user, &self.config.password)
            });
            callbacks
        }

        /// 仓库不存在时 clone，然后设置提交者
        fn setup_blocking(&self) -> Result<()> {
            let repo = if self.repo_dir.exists() {
                tracing::info!("Git repo already exists: {:?}", self.repo_dir);
                Repository::open(&self.repo_dir)?
            } else {
                tracing::info!("Cloning repo into {:?}...", self.repo_dir);
                if let Some(parent) = self.repo_dir.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut fetch = FetchOptions::new();
                fetch.remote_callbacks(self.callbacks());
                let repo = RepoBuilder::new()
                    .fetch_options(fetch)
                    .clone(&self.config.remote_url(), &self.repo_dir)?;
                tracing::info!("Cloning finished.");
                repo
            };

            let mut cfg = repo.config()?;
            if !self.config.author_name.is_empty() {
                cfg.set_str("user.name", &self.config.author_name)?;
            }
            if !self.config.author_email.is_empty() {
                cfg.set_str("user.email", &self.config.author_email)?;
            }
            Ok(())
        }

        fn signature(&self, repo: &Repository) -> Result<Signature<'static>> {
            if !self.config.author_name.is_empty() && !self.config.author_email.is_empty() {
                return Ok(Signature::now(&self.config.author_name, &self.config.author_email)?);
            }
            match repo.signature() {
                Ok(sig) => Ok(sig.to_owned()),
                Err(_) => Ok(Signature::now("episode-sync", "episode-sync@localhost")?),
            }
        }

        /// add + commit，没有变化时不提交
        fn commit_blocking(&self, repo: &Repository, artifact: &Path) -> Result<()> {
            let rel = artifact.strip_prefix(&self.repo_dir).map_err(|_| {
                Error::Sink(format!(
                    "{:?} 不在仓库目录 {:?} 内",
                    artifact, self.repo_dir
                ))
            })?;

            let mut index = repo.index()?;
            index.add_path(rel)?;
            index.write()?;
            let tree_id = index.write_tree()?;
            let tree = repo.find_tree(tree_id)?;

            let branch_ref = format!("refs/heads/{}", self.config.branch);
            let parent = repo
                .find_reference(&branch_ref)
                .ok()
                .and_then(|r| r.peel_to_commit().ok());

            if parent.as_ref().map(|p| p.tree_id()) == Some(tree_id) {
                tracing::debug!("Nothing to commit, {:?} unchanged", rel);
                return Ok(());
            }

            let sig = self.signature(repo)?;
            let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
            let oid = repo.commit(Some(branch_ref.as_str()), &sig, &sig, COMMIT_MESSAGE, &tree, &parents)?;

            let on_branch = repo
                .head()
                .ok()
                .and_then(|h| h.name().map(|n| n == branch_ref))
                .unwrap_or(false);
            if !on_branch {
                repo.set_head(&branch_ref)?;
            }

            tracing::info!("Commit finished: {}", oid);
            Ok(())
        }

        /// push 到 origin，远端拒绝也算失败
        fn push_blocking(&self, repo: &Repository) -> Result<()> {
            let mut remote = repo.find_remote("origin")?;
            let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.config.branch);

            let mut rejected: Option<String> = None;
            {
                let mut callbacks = self.callbacks();
                callbacks.push_update_reference(|refname, status| {
                    if let Some(msg) = status {
                        rejected = Some(format!("{}: {}", refname, msg));
                    }
                    Ok(())
                });
                let mut opts = PushOptions::new();
                opts.remote_callbacks(callbacks);
                remote
                    .push(&[refspec.as_str()], Some(&mut opts))
                    .map_err(|e| Error::Sink(format!("Pushing failed: {}", e)))?;
            }

            if let Some(msg) = rejected {
                return Err(Error::Sink(format!("Push rejected: {}", msg)));
            }

            tracing::info!("Pushing successful.");
            Ok(())
        }

        fn persist_blocking(&self, artifact: &Path) -> Result<()> {
            let repo = Repository::open(&self.repo_dir)?;
            self.commit_blocking(&repo, artifact)?;
            self.push_blocking(&repo)
        }
    }

    #[async_trait]
    impl PersistenceSink for GitSink {
        async fn prepare(&self) -> Result<()> {
            let sink = self.clone();
            tokio::task::spawn_blocking(move || sink.setup_blocking())
                .await
                .map_err(|e| anyhow::anyhow!("spawn_blocking failed: {}", e))?
        }

        async fn persist(&self, artifact: &Path) -> Result<()> {
            let sink = self.clone();
            let artifact = artifact.to_path_buf();
            tokio::task::spawn_blocking(move || sink.persist_blocking(&artifact))
                .await
                .map_err(|e| anyhow::anyhow!("spawn_blocking failed: {}", e))?
        }
    }
}
