use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::store::StoreOp;

/// Encode one op as `[len][bincode][crc32]`.
fn encode_op(writer: &mut impl Write, op: &StoreOp) -> io::Result<()> {
    let payload =
        bincode::serialize(op).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "WAL record too large"))?;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only log of store mutations.
///
/// Format per entry: `[u32: len][bincode: StoreOp][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A torn or corrupt tail (crash mid-write) ends replay at the last good entry.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, op: &StoreOp) -> io::Result<()> {
        self.append_buffered(op)?;
        self.flush_sync()
    }

    /// Buffer one op. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, op: &StoreOp) -> io::Result<()> {
        encode_op(&mut self.writer, op)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write `ops` to `<path>.tmp` and fsync. Does not touch the live log.
    pub fn write_compact_file<'a>(
        path: &Path,
        ops: impl IntoIterator<Item = &'a StoreOp>,
    ) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for op in ops {
            encode_op(&mut writer, op)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the compacted temp file over the log and reopen it.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Read every intact op from disk. A missing file replays as empty.
    pub fn replay(path: &Path) -> io::Result<Vec<StoreOp>> {
        Ok(Self::read_log(path)?.0)
    }

    /// Replay, then cut off any torn or corrupt tail so later appends land
    /// directly after the last good record.
    pub fn recover(path: &Path) -> io::Result<Vec<StoreOp>> {
        let (ops, valid_len) = Self::read_log(path)?;
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ops),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            tracing::warn!(
                "discarding {} bytes of damaged WAL tail after {} records",
                file_len - valid_len,
                ops.len()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(ops)
    }

    /// Intact ops plus the byte length they occupy from the start of the file.
    fn read_log(path: &Path) -> io::Result<(Vec<StoreOp>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut ops = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as u64;
            let record_len = 4 + len + 4;
            if valid_len + record_len > file_len {
                break; // torn
            }

            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload)?;
            let mut crc_buf = [0u8; 4];
            reader.read_exact(&mut crc_buf)?;
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                tracing::warn!("WAL checksum mismatch after {} records, truncating replay", ops.len());
                break;
            }

            match bincode::deserialize::<StoreOp>(&payload) {
                Ok(op) => ops.push(op),
                Err(_) => break,
            }
            valid_len += record_len;
        }

        Ok((ops, valid_len))
    }
}
