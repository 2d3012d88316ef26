//! DAG file persistence
//!
//! One file per epoch seed, named `full-R<revision>-<first 8 seed bytes hex>`:
//!
//! ```text
//! offset 0            8                         8 + full_size
//!        | magic (LE) | row 0 | row 1 | ... | row n-1 |
//! ```
//!
//! Rows sit at `8 + index * 64`. The magic number is written after the last
//! row, so a file whose generation was interrupted never passes as complete.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::dataset::{
    Dataset, DatasetSource, check_full_size, generate_dataset_with_progress, reserve_nodes,
};
use crate::error::{KrashError, Result};
use crate::light::Light;
use crate::params::{DAG_MAGIC_NUM, DAG_MAGIC_NUM_SIZE, HASH_BYTES, Params, REVISION};
use crate::primitives::{H256, Node};

/// File name of the DAG for `seed`
pub fn dag_file_name(seed: &H256) -> String {
    let mut name = format!("full-R{}-", REVISION);
    for byte in &seed[..8] {
        let _ = write!(name, "{:02x}", byte);
    }
    name
}

/// Path of the DAG for `seed` inside `dir`
pub fn dag_path(dir: &Path, seed: &H256) -> PathBuf {
    dir.join(dag_file_name(seed))
}

/// Outcome of [`prepare`]
#[derive(Debug)]
pub enum Prepared {
    /// A complete DAG of the right size exists and is opened
    Match(File),
    /// A new, correctly sized file was created and must be filled
    Created(File),
    /// A file exists but has the wrong size or no magic number
    SizeMismatch,
}

/// Open or create the DAG file for `seed` in `dir`
///
/// The directory is created if missing. With `force_create` any existing
/// file is truncated and recreated.
pub fn prepare(dir: &Path, seed: &H256, full_size: u64, force_create: bool) -> Result<Prepared> {
    fs::create_dir_all(dir).map_err(|e| KrashError::io(dir, e))?;
    let path = dag_path(dir, seed);

    if !force_create {
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(mut file) => {
                let found = file.metadata().map_err(|e| KrashError::io(&path, e))?.len();
                if found != full_size + DAG_MAGIC_NUM_SIZE as u64 {
                    debug!(path = %path.display(), found, full_size, "DAG size mismatch");
                    return Ok(Prepared::SizeMismatch);
                }
                let mut magic = [0u8; DAG_MAGIC_NUM_SIZE];
                if file.read_exact(&mut magic).is_err()
                    || u64::from_le_bytes(magic) != DAG_MAGIC_NUM
                {
                    debug!(path = %path.display(), "DAG magic number missing");
                    return Ok(Prepared::SizeMismatch);
                }
                return Ok(Prepared::Match(file));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(KrashError::io(&path, e)),
        }
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| KrashError::io(&path, e))?;
    file.set_len(full_size + DAG_MAGIC_NUM_SIZE as u64)
        .map_err(|e| KrashError::io(&path, e))?;
    Ok(Prepared::Created(file))
}

/// Write all rows of `dataset`, then the magic number
pub fn write_dataset(file: &mut File, path: &Path, dataset: &Dataset) -> Result<()> {
    let fail = |e: io::Error| KrashError::io(path, e);

    file.seek(SeekFrom::Start(DAG_MAGIC_NUM_SIZE as u64))
        .map_err(fail)?;
    {
        let mut writer = BufWriter::new(&mut *file);
        for node in dataset.nodes() {
            writer.write_all(&node.to_bytes()).map_err(fail)?;
        }
        writer.flush().map_err(fail)?;
    }

    file.seek(SeekFrom::Start(0)).map_err(fail)?;
    file.write_all(&DAG_MAGIC_NUM.to_le_bytes()).map_err(fail)?;
    file.sync_data().map_err(fail)
}

/// Dataset rows read in place from a complete DAG file
#[derive(Debug)]
pub struct DagFile {
    file: File,
    path: PathBuf,
    full_size: u64,
    params: Params,
}

impl DagFile {
    /// Open a complete DAG file, checking its size and magic number
    pub fn open(path: &Path, full_size: u64, params: Params) -> Result<Self> {
        check_full_size(full_size)?;
        let mut file = File::open(path).map_err(|e| KrashError::io(path, e))?;
        let len = file.metadata().map_err(|e| KrashError::io(path, e))?.len();
        let mut magic = [0u8; DAG_MAGIC_NUM_SIZE];
        let complete = len == full_size + DAG_MAGIC_NUM_SIZE as u64
            && file.read_exact(&mut magic).is_ok()
            && u64::from_le_bytes(magic) == DAG_MAGIC_NUM;
        if !complete {
            return Err(KrashError::MissingDag {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_file(file, path.to_path_buf(), full_size, params))
    }

    pub(crate) fn from_file(file: File, path: PathBuf, full_size: u64, params: Params) -> Self {
        Self {
            file,
            path,
            full_size,
            params,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row into memory
    pub fn load(&self) -> Result<Dataset> {
        let rows = self.rows() as usize;
        let mut nodes = reserve_nodes(rows)?;
        for index in 0..rows as u32 {
            nodes.push(self.row(index)?);
        }
        Dataset::from_nodes(nodes, self.params)
    }
}

impl DatasetSource for DagFile {
    fn full_size(&self) -> u64 {
        self.full_size
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn row(&self, index: u32) -> Result<Node> {
        let rows = self.rows();
        if index as u64 >= rows {
            return Err(KrashError::RowOutOfRange {
                index: index as u64,
                rows,
            });
        }
        let mut buf = [0u8; HASH_BYTES];
        let offset = DAG_MAGIC_NUM_SIZE as u64 + index as u64 * HASH_BYTES as u64;
        read_at(&self.file, &mut buf, offset).map_err(|e| KrashError::io(&self.path, e))?;
        Ok(Node::from_bytes(&buf))
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0;
    while done < buf.len() {
        let n = file.seek_read(&mut buf[done..], offset + done as u64)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        done += n;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn read_at(_file: &File, _buf: &mut [u8], _offset: u64) -> io::Result<()> {
    Err(io::ErrorKind::Unsupported.into())
}

/// Generate and persist the DAG for `block_number`'s epoch unless a complete
/// one already exists; returns its path
#[instrument(skip(params), fields(dir = %dir.display()))]
pub fn make_dag(block_number: u64, dir: &Path, params: Params) -> Result<PathBuf> {
    let light = Light::with_params(block_number, params)?;
    let full_size = light.full_size();
    let path = dag_path(dir, light.seed());

    let mut file = match prepare(dir, light.seed(), full_size, false)? {
        Prepared::Match(_) => {
            info!(path = %path.display(), "DAG already present");
            return Ok(path);
        }
        Prepared::Created(file) => file,
        Prepared::SizeMismatch => match prepare(dir, light.seed(), full_size, true)? {
            Prepared::Created(file) => file,
            _ => return Err(KrashError::MissingDag { path }),
        },
    };

    info!(path = %path.display(), full_size, "generating DAG");
    let mut last_logged = 0;
    let dataset = generate_dataset_with_progress(light.cache(), full_size, |percent| {
        if percent >= last_logged + 10 {
            info!(percent, "DAG generation progress");
            last_logged = percent;
        }
        true
    })?;
    write_dataset(&mut file, &path, &dataset)?;
    Ok(path)
}

/// Delete the DAG for `seed`; `false` if there was none
pub fn remove_dag(dir: &Path, seed: &H256) -> Result<bool> {
    let path = dag_path(dir, seed);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(KrashError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::epoch_seed;

    #[test]
    fn test_dag_file_name() {
        assert_eq!(dag_file_name(&[0u8; 32]), "full-R23-0000000000000000");
        assert_eq!(dag_file_name(&epoch_seed(1)), "full-R23-290decd9548b62a8");
    }

    #[test]
    fn test_prepare_states() {
        let dir = tempfile::tempdir().unwrap();
        let seed = [3u8; 32];
        let size = 256;

        let Prepared::Created(mut file) = prepare(dir.path(), &seed, size, false).unwrap() else {
            panic!("expected a new file");
        };
        // Sized but no magic yet
        assert!(matches!(
            prepare(dir.path(), &seed, size, false).unwrap(),
            Prepared::SizeMismatch
        ));

        let cache = crate::cache::Cache::generate(&seed, 832, Params::testing()).unwrap();
        let dataset = crate::dataset::generate_dataset(&cache, size).unwrap();
        write_dataset(&mut file, &dag_path(dir.path(), &seed), &dataset).unwrap();

        assert!(matches!(
            prepare(dir.path(), &seed, size, false).unwrap(),
            Prepared::Match(_)
        ));
        // Different expected size
        assert!(matches!(
            prepare(dir.path(), &seed, size + 128, false).unwrap(),
            Prepared::SizeMismatch
        ));
        assert!(matches!(
            prepare(dir.path(), &seed, size, true).unwrap(),
            Prepared::Created(_)
        ));
    }

    #[test]
    fn test_prepare_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        assert!(matches!(
            prepare(&nested, &[0u8; 32], 128, false).unwrap(),
            Prepared::Created(_)
        ));
        assert!(dag_path(&nested, &[0u8; 32]).exists());
    }

    #[test]
    fn test_dag_file_rows_match_memory() {
        let dir = tempfile::tempdir().unwrap();
        let params = Params::testing();
        let path = make_dag(0, dir.path(), params).unwrap();
        assert_eq!(path, dag_path(dir.path(), &[0u8; 32]));

        let light = Light::with_params(0, params).unwrap();
        let dag = DagFile::open(&path, light.full_size(), params).unwrap();
        let source = light.source().unwrap();
        for index in [0u32, 1, 250, 501] {
            assert_eq!(dag.row(index).unwrap(), source.row(index).unwrap());
        }
        assert!(dag.row(502).is_err());
        assert_eq!(dag.load().unwrap().len(), 502);
    }

    #[test]
    fn test_make_dag_is_idempotent_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let params = Params::testing();
        let first = make_dag(150, dir.path(), params).unwrap();
        let modified = fs::metadata(&first).unwrap().modified().unwrap();
        let second = make_dag(199, dir.path(), params).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&second).unwrap().modified().unwrap(), modified);

        assert!(remove_dag(dir.path(), &epoch_seed(1)).unwrap());
        assert!(!remove_dag(dir.path(), &epoch_seed(1)).unwrap());
    }

    #[test]
    fn test_open_rejects_incomplete_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed = [0u8; 32];
        let Prepared::Created(_) = prepare(dir.path(), &seed, 256, false).unwrap() else {
            panic!("expected a new file");
        };
        let err = DagFile::open(&dag_path(dir.path(), &seed), 256, Params::testing()).unwrap_err();
        assert!(matches!(err, KrashError::MissingDag { .. }));
    }

    #[test]
    fn test_open_rejects_unaddressable_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_dag(0, dir.path(), Params::testing()).unwrap();
        let huge = (u32::MAX as u64 + 1) * HASH_BYTES as u64;
        for size in [0, 100, huge] {
            assert!(matches!(
                DagFile::open(&path, size, Params::testing()),
                Err(KrashError::InvalidDatasetSize { .. })
            ));
        }
        assert!(DagFile::open(&path, 32_128, Params::testing()).is_ok());
    }
}
