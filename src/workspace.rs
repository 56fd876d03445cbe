// src/workspace.rs
//! Storage areas under a fixed root.
//!
//! ```text
//! <root>/final/<story_id>.mp4
//! <root>/runs/<job_id>/<run_id>/{audio,video,synced,scratch}/
//! ```
//!
//! Every job run owns its own namespace, so concurrent jobs never share
//! intermediate artifacts.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

const FINAL_DIR: &str = "final";
const RUNS_DIR: &str = "runs";
const FINAL_EXTENSION: &str = "mp4";

/// Named storage areas of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Audio,
    Video,
    Synced,
    Scratch,
}

impl Area {
    pub const ALL: [Area; 4] = [Area::Audio, Area::Video, Area::Synced, Area::Scratch];

    pub fn dir_name(self) -> &'static str {
        match self {
            Area::Audio => "audio",
            Area::Video => "video",
            Area::Synced => "synced",
            Area::Scratch => "scratch",
        }
    }

    fn artifact_prefix(self) -> &'static str {
        match self {
            Area::Audio => "a",
            Area::Video => "v",
            Area::Synced => "merged",
            Area::Scratch => "tmp",
        }
    }

    fn artifact_extension(self) -> &'static str {
        match self {
            Area::Audio => "wav",
            _ => "mp4",
        }
    }

    /// File name of the artifact at `index`, e.g. `a_9.wav`.
    pub fn artifact_name(self, index: usize) -> String {
        format!(
            "{}_{}.{}",
            self.artifact_prefix(),
            index,
            self.artifact_extension()
        )
    }
}

fn artifact_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]+_(\d+)\.[A-Za-z0-9]+$").expect("artifact index pattern is valid")
    })
}

/// Numeric index encoded in an artifact file name (`v_10.mp4` -> 10).
pub fn artifact_index(file_name: &str) -> Option<usize> {
    artifact_index_pattern()
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Monotonic artifact counter owned by one run of the orchestrator.
#[derive(Debug, Default)]
pub struct ArtifactSequence {
    next: usize,
}

impl ArtifactSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Delete everything under `dir` and leave it existing and empty.
/// Succeeds when `dir` does not exist yet, and when called repeatedly.
pub async fn reset_dir(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await
}

const NAME_DIGEST_CHARS: usize = 16;

fn is_plain_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// File-system name for a story id, distinct for distinct ids.
///
/// Plain ids (`[A-Za-z0-9_-]+`) are used as they are. Anything else keeps a
/// readable sanitized stem followed by `.` and a digest of the raw id; plain
/// ids never contain `.`, so the two forms cannot meet.
pub fn storage_name(raw: &str) -> String {
    if is_plain_id(raw) {
        return raw.to_string();
    }
    let stem: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}.{}", stem, &digest[..NAME_DIGEST_CHARS])
}

/// Root of all artifacts served by the service.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join(FINAL_DIR)
    }

    pub fn final_path(&self, story_id: &str) -> PathBuf {
        self.final_dir()
            .join(format!("{}.{}", storage_name(story_id), FINAL_EXTENSION))
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(storage_name(job_id))
    }

    pub fn run_dir(&self, job_id: &str, run_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join(run_id.to_string())
    }

    /// Create the namespace for one run with all areas present.
    pub async fn open_run(&self, job_id: &str, run_id: Uuid) -> std::io::Result<RunWorkspace> {
        let run = RunWorkspace {
            dir: self.run_dir(job_id, run_id),
        };
        for area in Area::ALL {
            tokio::fs::create_dir_all(run.area_dir(area)).await?;
        }
        tokio::fs::create_dir_all(self.final_dir()).await?;
        Ok(run)
    }

    /// Remove the namespace of one run, and the job directory once it is empty.
    pub async fn discard_run(&self, job_id: &str, run_id: Uuid) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(self.run_dir(job_id, run_id)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        // fails while other runs of the job remain
        let _ = tokio::fs::remove_dir(self.job_dir(job_id)).await;
        Ok(())
    }

    /// Move a fully written output into the final area.
    pub async fn publish(&self, staged: &Path, story_id: &str) -> std::io::Result<PathBuf> {
        let target = self.final_path(story_id);
        tokio::fs::create_dir_all(self.final_dir()).await?;
        tokio::fs::rename(staged, &target).await?;
        Ok(target)
    }

    /// Path relative to the root, with forward slashes, for building references.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Resolve a client-supplied relative path, refusing anything that escapes the root.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = Path::new(relative.trim_start_matches('/'));
        if candidate.as_os_str().is_empty() {
            return None;
        }
        let safe = candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(candidate))
    }
}

/// The isolated namespace of one job run.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    dir: PathBuf,
}

impl RunWorkspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn area_dir(&self, area: Area) -> PathBuf {
        self.dir.join(area.dir_name())
    }

    /// Empty an area; idempotent and tolerant of a missing directory.
    pub async fn reset(&self, area: Area) -> std::io::Result<()> {
        reset_dir(&self.area_dir(area)).await
    }

    pub fn artifact_path(&self, area: Area, index: usize) -> PathBuf {
        self.area_dir(area).join(area.artifact_name(index))
    }

    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.area_dir(Area::Scratch).join(name)
    }

    /// Artifacts present in an area, ordered by their numeric index.
    pub async fn indexed_artifacts(&self, area: Area) -> std::io::Result<Vec<(usize, PathBuf)>> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.area_dir(area)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(index) = artifact_index(&name.to_string_lossy()) {
                found.push((index, entry.path()));
            }
        }
        found.sort_by_key(|(index, _)| *index);
        Ok(found)
    }
}
