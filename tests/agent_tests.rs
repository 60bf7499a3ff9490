//! Agent 集成测试

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use episode_sync::agent::Scheduler;
use episode_sync::*;
use tempfile::TempDir;

/// 固定页面的 FeedClient，记录拉取次数
struct FixedFeed {
    ids: Vec<&'static str>,
    fetches: AtomicUsize,
}

impl FixedFeed {
    fn new(ids: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            ids,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl FeedClient for FixedFeed {
    async fn fetch_page(&self, _feed_id: &str, _max: u32) -> Result<Vec<FeedItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| FeedItem::new(*id, format!("Episode {}", id), i))
            .collect())
    }

    async fn classify(&self, _item: &FeedItem) -> Result<Classification> {
        Ok(Classification::Eligible)
    }
}

/// 每次持久化都要等一段时间的 Sink
struct SlowSink {
    delay: Duration,
    persisted: AtomicUsize,
}

#[async_trait]
impl PersistenceSink for SlowSink {
    async fn persist(&self, _artifact: &Path) -> Result<()> {
        self.persisted.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

fn engine_with(tmp: &TempDir, feed: Arc<dyn FeedClient>, sink: Arc<dyn PersistenceSink>) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(
        feed,
        Publisher::new(
            tmp.path().join("episode.json"),
            CursorStore::new(tmp.path().join("youtube_data.json")),
            sink,
            Broadcaster::new(),
        ),
        EngineOptions::default(),
    ))
}

// ==================== Scheduler 测试 ====================

mod scheduler_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let tmp = TempDir::new().unwrap();
        CursorStore::new(tmp.path().join("youtube_data.json"))
            .save(&SyncState::seeded("1"))
            .unwrap();
        let feed = FixedFeed::new(vec![]);
        let scheduler = Scheduler::new(
            engine_with(&tmp, feed.clone(), Arc::new(NullSink)),
            Duration::from_secs(7200),
        );

        assert!(scheduler.start());
        // 重复启动被拒绝
        assert!(!scheduler.start());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.cycles(), 1);
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(scheduler.cycles(), 2);

        scheduler.stop().await;
        assert!(!scheduler.is_scheduled());
        tokio::time::sleep(Duration::from_secs(7200 * 3)).await;
        assert_eq!(scheduler.cycles(), 2);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_cycle() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::new(tmp.path().join("youtube_data.json"));
        store
            .save(&SyncState {
                last_accepted_id: Some("4".to_string()),
                ..SyncState::seeded("1")
            })
            .unwrap();

        let sink = Arc::new(SlowSink {
            delay: Duration::from_millis(300),
            persisted: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            engine_with(&tmp, FixedFeed::new(vec!["5", "4"]), sink.clone()),
            Duration::from_secs(7200),
        );

        assert!(scheduler.start());
        // 周期正在 Sink 里等待时停止
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.persisted.load(Ordering::SeqCst), 1);
        scheduler.stop().await;

        assert!(!scheduler.is_scheduled());
        assert_eq!(scheduler.cycles(), 1);
        let state = store.load().unwrap();
        assert_eq!(state.last_accepted_id.as_deref(), Some("5"));
        assert!(state.last_checked_at.is_some());
        assert_eq!(
            read_pointer(&tmp.path().join("episode.json")).unwrap().id,
            "5"
        );
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_scheduler() {
        let tmp = TempDir::new().unwrap();
        // 没有 border
        let feed = FixedFeed::new(vec!["2", "1"]);
        let scheduler = Scheduler::new(
            engine_with(&tmp, feed.clone(), Arc::new(NullSink)),
            Duration::from_secs(60),
        );

        assert_eq!(scheduler.run_once().await, None);
        assert_eq!(scheduler.run_once().await, None);
        assert_eq!(scheduler.cycles(), 2);
        assert_eq!(scheduler.corrupt_streak(), 0);
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_state_streak() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("youtube_data.json"), "not json").unwrap();
        let scheduler = Scheduler::new(
            engine_with(&tmp, FixedFeed::new(vec!["1"]), Arc::new(NullSink)),
            Duration::from_secs(60),
        );

        for _ in 0..3 {
            assert_eq!(scheduler.run_once().await, None);
        }
        assert_eq!(scheduler.corrupt_streak(), 3);

        // 运维修好状态文件后计数清零
        CursorStore::new(tmp.path().join("youtube_data.json"))
            .save(&SyncState::seeded("1"))
            .unwrap();
        assert_eq!(scheduler.run_once().await, Some(CycleOutcome::NoNewItem));
        assert_eq!(scheduler.corrupt_streak(), 0);
    }

    #[tokio::test]
    async fn test_published_outcome() {
        let tmp = TempDir::new().unwrap();
        CursorStore::new(tmp.path().join("youtube_data.json"))
            .save(&SyncState::seeded("1"))
            .unwrap();
        let scheduler = Scheduler::new(
            engine_with(&tmp, FixedFeed::new(vec!["3", "2", "1"]), Arc::new(NullSink)),
            Duration::from_secs(60),
        );

        match scheduler.run_once().await {
            Some(CycleOutcome::Published(item)) => assert_eq!(item.id, "2"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        // 同一小时内再次触发被限流
        assert!(matches!(
            scheduler.run_once().await,
            Some(CycleOutcome::Throttled { .. })
        ));
    }
}

// ==================== GitSink 测试 ====================

#[cfg(feature = "git")]
mod git_sink_tests {
    use super::*;
    use git2::Repository;

    fn repo_config(remote: &Path) -> RepoConfig {
        RepoConfig {
            url: format!("file://{}", remote.display()),
            name: "podcast".to_string(),
            author_name: "Episode Bot".to_string(),
            author_email: "bot@example.com".to_string(),
            branch: "main".to_string(),
            ..Default::default()
        }
    }

    fn remote_pointer(remote: &Path) -> (String, usize) {
        let repo = Repository::open_bare(remote).unwrap();
        let commit = repo
            .find_reference("refs/heads/main")
            .unwrap()
            .peel_to_commit()
            .unwrap();
        assert_eq!(commit.message(), Some("set new youtube video id"));
        assert_eq!(commit.author().name(), Some("Episode Bot"));

        let entry = commit.tree().unwrap().get_path(Path::new("episode.json")).unwrap();
        let blob = repo.find_blob(entry.id()).unwrap();
        let content = String::from_utf8(blob.content().to_vec()).unwrap();

        let mut walk = repo.revwalk().unwrap();
        walk.push(commit.id()).unwrap();
        (content, walk.count())
    }

    #[tokio::test]
    async fn test_clone_commit_push() {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let repo_dir = tmp.path().join("RemoteRepo").join("podcast");
        let sink = GitSink::new(&repo_dir, repo_config(&remote));
        sink.prepare().await.unwrap();
        assert!(repo_dir.join(".git").exists());

        let pointer = repo_dir.join("episode.json");
        std::fs::write(&pointer, r#"{"id":"v2"}"#).unwrap();
        sink.persist(&pointer).await.unwrap();
        assert_eq!(remote_pointer(&remote), (r#"{"id":"v2"}"#.to_string(), 1));

        // 内容不变：不产生新提交，push 仍然成功
        sink.persist(&pointer).await.unwrap();
        assert_eq!(remote_pointer(&remote).1, 1);

        std::fs::write(&pointer, r#"{"id":"v3"}"#).unwrap();
        sink.persist(&pointer).await.unwrap();
        assert_eq!(remote_pointer(&remote), (r#"{"id":"v3"}"#.to_string(), 2));

        // 已存在的仓库直接复用
        sink.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn test_diverged_remote_is_sink_error() {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let ours = GitSink::new(tmp.path().join("a"), repo_config(&remote));
        let theirs = GitSink::new(tmp.path().join("b"), repo_config(&remote));
        ours.prepare().await.unwrap();
        theirs.prepare().await.unwrap();

        std::fs::write(tmp.path().join("b").join("episode.json"), r#"{"id":"x"}"#).unwrap();
        theirs.persist(&tmp.path().join("b").join("episode.json")).await.unwrap();

        let pointer = tmp.path().join("a").join("episode.json");
        std::fs::write(&pointer, r#"{"id":"y"}"#).unwrap();
        let err = ours.persist(&pointer).await.unwrap_err();
        assert!(matches!(err, Error::Sink(_)), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_artifact_outside_repo() {
        let tmp = TempDir::new().unwrap();
        let remote = tmp.path().join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let sink = GitSink::new(tmp.path().join("repo"), repo_config(&remote));
        sink.prepare().await.unwrap();

        let outside = tmp.path().join("episode.json");
        std::fs::write(&outside, "{}").unwrap();
        assert!(matches!(sink.persist(&outside).await, Err(Error::Sink(_))));
    }
}

// ==================== Agent 测试 ====================

#[cfg(feature = "agent")]
mod agent_tests {
    use super::*;
    use episode_sync::agent::{cleanup_stale_agent, is_agent_running, Agent};
    use std::sync::Mutex;

    fn test_config(tmp: &TempDir) -> SyncConfig {
        SyncConfig {
            data_dir: tmp.path().to_path_buf(),
            repo: RepoConfig {
                name: "podcast".to_string(),
                branch: "main".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_agent_wiring() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        CursorStore::new(config.state_path())
            .save(&SyncState::seeded("1"))
            .unwrap();

        let agent = Agent::with_parts(
            config.clone(),
            FixedFeed::new(vec!["2", "1"]),
            Arc::new(NullSink),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        agent.broadcaster().on_published(move |item| {
            seen_clone.lock().unwrap().push(item.id.clone());
        });

        let outcome = agent.engine().run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published(ref item) if item.id == "2"));
        assert_eq!(read_pointer(&config.pointer_path()).unwrap().id, "2");
        assert_eq!(*seen.lock().unwrap(), vec!["2".to_string()]);
    }

    #[test]
    fn test_agent_new_requires_config() {
        let tmp = TempDir::new().unwrap();
        assert!(Agent::new(test_config(&tmp)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_pid_file_guard() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        assert!(!is_agent_running(&config));

        std::fs::write(config.pid_path(), std::process::id().to_string()).unwrap();
        assert!(is_agent_running(&config));

        cleanup_stale_agent(&config).unwrap();
        assert!(!config.pid_path().exists());
        assert!(!is_agent_running(&config));
    }
}
