use std::fs;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::error::{CacheError, CacheResult};

/// 1 GiB map; plenty for derived indexes, and sparse until used.
const MAP_SIZE: usize = 1024 * 1024 * 1024;

pub const DB_META: &str = "meta";
pub const DB_FILES_BY_PATH: &str = "files_by_path";
pub const DB_OUTPUTS_BY_KIND: &str = "outputs_by_kind";
pub const DB_DIAGS_BY_SEV: &str = "diags_by_sev";
pub const DB_DIAGS_BY_CODE: &str = "diags_by_code";
pub const DB_STATS: &str = "stats";

const ALL_DBS: [&str; 6] = [
    DB_META,
    DB_FILES_BY_PATH,
    DB_OUTPUTS_BY_KIND,
    DB_DIAGS_BY_SEV,
    DB_DIAGS_BY_CODE,
    DB_STATS,
];

/// LMDB environment with the six named cache databases.
///
/// LMDB gives many concurrent readers and a single writer; all six
/// databases use raw byte keys and values so the key layout stays visible
/// in one place ([`crate::key`]).
pub struct CacheEnv {
    env: Env,
    dir: PathBuf,
    meta: Database<Bytes, Bytes>,
    files_by_path: Database<Bytes, Bytes>,
    outputs_by_kind: Database<Bytes, Bytes>,
    diags_by_sev: Database<Bytes, Bytes>,
    diags_by_code: Database<Bytes, Bytes>,
    stats: Database<Bytes, Bytes>,
}

impl CacheEnv {
    /// Whether an environment exists at `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join("data.mdb").exists()
    }

    /// Create (or open) an environment for writing; all databases are
    /// created if absent.
    pub fn create(dir: &Path) -> CacheResult<Self> {
        fs::create_dir_all(dir)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(ALL_DBS.len() as u32)
                .open(dir)?
        };

        let mut wtxn = env.write_txn()?;
        let meta = env.create_database(&mut wtxn, Some(DB_META))?;
        let files_by_path = env.create_database(&mut wtxn, Some(DB_FILES_BY_PATH))?;
        let outputs_by_kind = env.create_database(&mut wtxn, Some(DB_OUTPUTS_BY_KIND))?;
        let diags_by_sev = env.create_database(&mut wtxn, Some(DB_DIAGS_BY_SEV))?;
        let diags_by_code = env.create_database(&mut wtxn, Some(DB_DIAGS_BY_CODE))?;
        let stats = env.create_database(&mut wtxn, Some(DB_STATS))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            dir: dir.to_path_buf(),
            meta,
            files_by_path,
            outputs_by_kind,
            diags_by_sev,
            diags_by_code,
            stats,
        })
    }

    /// Open an existing environment; fails if any database is missing.
    pub fn open(dir: &Path) -> CacheResult<Self> {
        if !Self::exists(dir) {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no cache at {}", dir.display()),
            )));
        }
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(ALL_DBS.len() as u32)
                .open(dir)?
        };

        let rtxn = env.read_txn()?;
        let open = |name: &'static str| -> CacheResult<Database<Bytes, Bytes>> {
            env.open_database(&rtxn, Some(name))?
                .ok_or(CacheError::MissingDatabase(name))
        };
        let meta = open(DB_META)?;
        let files_by_path = open(DB_FILES_BY_PATH)?;
        let outputs_by_kind = open(DB_OUTPUTS_BY_KIND)?;
        let diags_by_sev = open(DB_DIAGS_BY_SEV)?;
        let diags_by_code = open(DB_DIAGS_BY_CODE)?;
        let stats = open(DB_STATS)?;
        drop(rtxn);

        Ok(Self {
            env,
            dir: dir.to_path_buf(),
            meta,
            files_by_path,
            outputs_by_kind,
            diags_by_sev,
            diags_by_code,
            stats,
        })
    }

    /// Remove an environment from disk entirely. The cache is derived;
    /// this is always safe.
    pub fn wipe(dir: &Path) -> CacheResult<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_db(&self) -> Database<Bytes, Bytes> {
        self.meta
    }

    pub fn files_by_path(&self) -> Database<Bytes, Bytes> {
        self.files_by_path
    }

    pub fn outputs_by_kind(&self) -> Database<Bytes, Bytes> {
        self.outputs_by_kind
    }

    pub fn diags_by_sev(&self) -> Database<Bytes, Bytes> {
        self.diags_by_sev
    }

    pub fn diags_by_code(&self) -> Database<Bytes, Bytes> {
        self.diags_by_code
    }

    pub fn stats(&self) -> Database<Bytes, Bytes> {
        self.stats
    }

    /// Path of `cache_meta.json` next to the LMDB data files.
    pub fn meta_path(dir: &Path) -> PathBuf {
        dir.join("cache_meta.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("lmdb");

        let env = CacheEnv::create(&cache_dir).unwrap();
        let mut wtxn = env.env().write_txn().unwrap();
        env.meta_db().put(&mut wtxn, b"k", b"v").unwrap();
        wtxn.commit().unwrap();
        drop(env);

        assert!(CacheEnv::exists(&cache_dir));
        let env = CacheEnv::open(&cache_dir).unwrap();
        let rtxn = env.env().read_txn().unwrap();
        assert_eq!(env.meta_db().get(&rtxn, b"k").unwrap(), Some(&b"v"[..]));
    }

    #[test]
    fn open_missing_env_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheEnv::open(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn wipe_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("lmdb");
        drop(CacheEnv::create(&cache_dir).unwrap());
        assert!(CacheEnv::exists(&cache_dir));

        CacheEnv::wipe(&cache_dir).unwrap();
        assert!(!cache_dir.exists());
        // Wiping an absent dir is a no-op.
        CacheEnv::wipe(&cache_dir).unwrap();
    }
}
