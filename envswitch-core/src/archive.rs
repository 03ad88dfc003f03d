/*!
Compressed archives of whole environment directories.

Archives are gzip tar streams named `<env>-<YYYYMMDD-HHMMSS>.tar.gz`, with
every entry rooted at `<env>/`. They are written through a temp file in the
archives directory, so a failed write never leaves a partial archive behind.
*/

use crate::environment::Environment;
use crate::{EnvSwitchError, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const ARCHIVE_EXTENSION: &str = ".tar.gz";
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
// "-YYYYMMDD-HHMMSS"
const STAMP_LEN: usize = 16;

/// A freshly written archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub path: PathBuf,
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    /// Hex SHA-256 of the archive file
    pub sha256: String,
}

/// An archive found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub file_name: String,
    /// Environment name parsed from the file name, when it follows the pattern
    pub environment: Option<String>,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Creates, lists, prunes and extracts archives in one directory
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    dir: PathBuf,
    level: Compression,
}

impl ArchiveManager {
    /// Manager writing with the default gzip level (6)
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            level: Compression::default(),
        }
    }

    /// Use gzip level `level` (0-9, clamped)
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive the environment directory
    pub fn create_archive(&self, env: &Environment) -> Result<Archive> {
        if !env.path.is_dir() {
            return Err(EnvSwitchError::archive(format!(
                "environment directory {} does not exist",
                env.path.display()
            )));
        }
        fs::create_dir_all(&self.dir)?;

        let created_at = Local::now();
        let target = self.next_free_name(&env.name, &created_at.format(STAMP_FORMAT).to_string());

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        write_tar_gz(tmp.as_file_mut(), &env.path, &env.name, self.level)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&target)
            .map_err(|e| EnvSwitchError::archive(format!("{}: {}", target.display(), e.error)))?;

        let size = fs::metadata(&target)?.len();
        let sha256 = file_sha256(&target)?;
        info!(
            "Archived environment '{}' to {} ({} bytes)",
            env.name,
            target.display(),
            size
        );

        Ok(Archive {
            path: target,
            environment: env.name.clone(),
            created_at: created_at.with_timezone(&Utc),
            size,
            sha256,
        })
    }

    /// Archives in the directory, newest first; ties broken by file name
    pub fn list_archives(&self) -> Result<Vec<ArchiveInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = file_name.strip_suffix(ARCHIVE_EXTENSION) else {
                continue;
            };
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            archives.push(ArchiveInfo {
                path: entry.path(),
                environment: split_archive_name(stem).map(|(env, _)| env.to_string()),
                file_name,
                size: meta.len(),
                modified: DateTime::<Utc>::from(meta.modified()?),
            });
        }

        archives.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(archives)
    }

    /// Delete every archive beyond the `retention` newest
    ///
    /// `retention <= 0` keeps everything. Returns the number removed.
    pub fn cleanup_old_archives(&self, retention: i64) -> Result<usize> {
        if retention <= 0 {
            return Ok(0);
        }
        let keep = usize::try_from(retention).unwrap_or(usize::MAX);

        let mut removed = 0;
        for archive in self.list_archives()?.into_iter().skip(keep) {
            match fs::remove_file(&archive.path) {
                Ok(()) => {
                    debug!("Removed old archive {}", archive.path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove archive {}: {}", archive.path.display(), e),
            }
        }
        if removed > 0 {
            info!("Removed {} archive(s) beyond retention {}", removed, retention);
        }
        Ok(removed)
    }

    fn next_free_name(&self, env: &str, stamp: &str) -> PathBuf {
        let base = self.dir.join(format!("{env}-{stamp}{ARCHIVE_EXTENSION}"));
        if !base.exists() {
            return base;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("{env}-{stamp}-{n}{ARCHIVE_EXTENSION}")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }
}

/// Extract `archive` under `dest`, recreating `dest/<env>/...` with modes
pub fn restore_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);

    fs::create_dir_all(dest)?;
    tar.unpack(dest).map_err(|e| {
        EnvSwitchError::archive(format!("failed to extract {}: {}", archive.display(), e))
    })?;
    info!("Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

fn write_tar_gz(out: &mut File, root: &Path, prefix: &str, level: Compression) -> Result<()> {
    let mut builder = tar::Builder::new(GzEncoder::new(out, level));
    builder.follow_symlinks(false);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = Path::new(prefix).join(relative);
        builder.append_path_with_name(entry.path(), &name)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Split `<env>-<YYYYMMDD-HHMMSS>[-N]` into the environment and timestamp
fn split_archive_name(stem: &str) -> Option<(&str, NaiveDateTime)> {
    fn parse(s: &str) -> Option<(&str, NaiveDateTime)> {
        let cut = s.len().checked_sub(STAMP_LEN)?;
        if cut == 0 || !s.is_char_boundary(cut) {
            return None;
        }
        let (env, stamp) = s.split_at(cut);
        let stamp = NaiveDateTime::parse_from_str(stamp.strip_prefix('-')?, STAMP_FORMAT).ok()?;
        Some((env, stamp))
    }

    parse(stem).or_else(|| {
        let (head, n) = stem.rsplit_once('-')?;
        n.parse::<u32>().ok()?;
        parse(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn sample_env(root: &Path) -> Environment {
        let path = root.join("environments/work");
        fs::create_dir_all(path.join("snapshots/git")).unwrap();
        fs::write(path.join("metadata.yaml"), "name: work\n").unwrap();
        fs::write(path.join("snapshots/git/.gitconfig"), "[user]\n\tname = W\n").unwrap();
        Environment::new("work", path)
    }

    fn touch_archive(dir: &Path, name: &str, mtime: i64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        path
    }

    #[test]
    fn test_create_and_restore_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let env = sample_env(temp_dir.path());
        let manager = ArchiveManager::new(temp_dir.path().join("archives"));

        let archive = manager.create_archive(&env).unwrap();
        let name = archive.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("work-"));
        assert!(name.ends_with(".tar.gz"));
        assert_eq!(archive.size, fs::metadata(&archive.path).unwrap().len());
        assert_eq!(archive.sha256.len(), 64);

        let dest = temp_dir.path().join("restored");
        restore_archive(&archive.path, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("work/snapshots/git/.gitconfig")).unwrap(),
            "[user]\n\tname = W\n"
        );
        assert!(dest.join("work/metadata.yaml").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_survive_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let env = sample_env(temp_dir.path());
        let secret = env.path.join("snapshots/git/.gitconfig");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o600)).unwrap();

        let manager = ArchiveManager::new(temp_dir.path().join("archives"));
        let archive = manager.create_archive(&env).unwrap();
        let dest = temp_dir.path().join("restored");
        restore_archive(&archive.path, &dest).unwrap();

        let mode = fs::metadata(dest.join("work/snapshots/git/.gitconfig"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_same_second_archives_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let env = sample_env(temp_dir.path());
        let manager = ArchiveManager::new(temp_dir.path().join("archives")).with_level(1);

        let first = manager.create_archive(&env).unwrap();
        let second = manager.create_archive(&env).unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(manager.list_archives().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_environment_dir_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ArchiveManager::new(temp_dir.path().join("archives"));
        let env = Environment::new("ghost", temp_dir.path().join("nope"));

        assert!(matches!(
            manager.create_archive(&env),
            Err(EnvSwitchError::Archive(_))
        ));
        assert!(manager.list_archives().unwrap().is_empty());
    }

    #[test]
    fn test_list_orders_newest_first_with_name_tiebreak() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        touch_archive(&dir, "a-20240101-000000.tar.gz", 1_000);
        touch_archive(&dir, "b-20240102-000000.tar.gz", 3_000);
        touch_archive(&dir, "c-20240103-000000.tar.gz", 2_000);
        touch_archive(&dir, "d-20240103-000000.tar.gz", 2_000);
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = ArchiveManager::new(&dir)
            .list_archives()
            .unwrap()
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "b-20240102-000000.tar.gz",
                "d-20240103-000000.tar.gz",
                "c-20240103-000000.tar.gz",
                "a-20240101-000000.tar.gz",
            ]
        );
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        for (i, name) in ["w-20240101-000001.tar.gz", "w-20240101-000002.tar.gz", "w-20240101-000003.tar.gz"]
            .iter()
            .enumerate()
        {
            touch_archive(&dir, name, 1_000 + i as i64);
        }
        let manager = ArchiveManager::new(&dir);

        assert_eq!(manager.cleanup_old_archives(0).unwrap(), 0);
        assert_eq!(manager.cleanup_old_archives(-3).unwrap(), 0);
        assert_eq!(manager.cleanup_old_archives(2).unwrap(), 1);

        let remaining: Vec<String> = manager
            .list_archives()
            .unwrap()
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(remaining, vec!["w-20240101-000003.tar.gz", "w-20240101-000002.tar.gz"]);
        assert_eq!(manager.cleanup_old_archives(5).unwrap(), 0);
    }

    #[test]
    fn test_split_archive_name() {
        let (env, stamp) = split_archive_name("my-env-20240315-142501").unwrap();
        assert_eq!(env, "my-env");
        assert_eq!(stamp.format(STAMP_FORMAT).to_string(), "20240315-142501");

        assert_eq!(split_archive_name("work-20240315-142501-2").unwrap().0, "work");
        assert!(split_archive_name("20240315-142501").is_none());
        assert!(split_archive_name("random").is_none());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let bogus = temp_dir.path().join("bogus.tar.gz");
        fs::write(&bogus, b"definitely not gzip").unwrap();
        assert!(restore_archive(&bogus, &temp_dir.path().join("out")).is_err());
    }
}
