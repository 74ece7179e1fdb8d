//! Whole-index serialization
//!
//! Layout (little-endian): magic, version, entry count, staging limit, initial
//! staging capacity, then the staging buffers, the segment pool, the term
//! dictionary and finally the per-term metadata records.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::staging::StagingBuffer;
use super::{IndexConfig, InvertedIndex, PostingsMeta};
use crate::structures::{SegmentPool, TermDictionary};
use crate::{Error, Result};

/// "SGDX"
pub const INDEX_MAGIC: u32 = 0x5844_4753;
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Suffix of the file written before renaming over the target
const TMP_SUFFIX: &str = "tmp";

/// Records reserved up front while loading; more are added as data arrives
const LOAD_RESERVE_LIMIT: usize = 4096;

impl InvertedIndex {
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_FORMAT_VERSION)?;
        writer.write_u64::<LittleEndian>(self.num_entries)?;
        writer.write_u32::<LittleEndian>(self.config.staging_limit as u32)?;
        writer.write_u32::<LittleEndian>(self.config.initial_staging_capacity as u32)?;

        writer.write_u32::<LittleEndian>(self.staging.len() as u32)?;
        for buffer in &self.staging {
            buffer.save(writer)?;
        }
        self.pool.save(writer)?;
        self.dictionary.save(writer)?;
        writer.write_u32::<LittleEndian>(self.postings.len() as u32)?;
        for meta in &self.postings {
            meta.save(writer)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(Error::IncompatibleFormat(format!(
                "bad index magic {:#010x}",
                magic
            )));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != INDEX_FORMAT_VERSION {
            return Err(Error::IncompatibleFormat(format!(
                "index version {} (expected {})",
                version, INDEX_FORMAT_VERSION
            )));
        }
        let num_entries = reader.read_u64::<LittleEndian>()?;
        let staging_limit = reader.read_u32::<LittleEndian>()? as usize;
        let initial_staging_capacity = reader.read_u32::<LittleEndian>()? as usize;

        let num_staging = reader.read_u32::<LittleEndian>()? as usize;
        let mut staging = Vec::with_capacity(num_staging.min(LOAD_RESERVE_LIMIT));
        for _ in 0..num_staging {
            staging.push(StagingBuffer::load(reader, staging_limit)?);
        }
        let pool = SegmentPool::load(reader)?;
        let dictionary = TermDictionary::load(reader)?;
        let num_postings = reader.read_u32::<LittleEndian>()? as usize;
        let mut postings = Vec::with_capacity(num_postings.min(LOAD_RESERVE_LIMIT));
        for _ in 0..num_postings {
            postings.push(PostingsMeta::load(reader)?);
        }

        if num_staging != dictionary.len() || num_postings != dictionary.len() {
            return Err(Error::Corruption(format!(
                "{} terms but {} staging buffers and {} metadata records",
                dictionary.len(),
                num_staging,
                num_postings
            )));
        }
        for meta in &postings {
            for handle in [meta.head, meta.tail].into_iter().flatten() {
                pool.block_header(handle)?;
            }
        }

        let config = IndexConfig {
            segment_capacity: pool.segment_capacity(),
            order: pool.order(),
            staging_limit,
            initial_staging_capacity,
        };
        config.validate()?;

        log::debug!(
            "loaded index: {} terms, {} entries, {} segments",
            dictionary.len(),
            num_entries,
            pool.num_segments()
        );
        Ok(Self {
            config,
            dictionary,
            postings,
            staging,
            pool,
            num_entries,
        })
    }

    /// Save to a file, writing a temp file first and renaming it over `path`
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = tmp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            self.save(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp_path, path)?;
        log::info!("saved index to {}", path.display());
        Ok(())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        Self::load(&mut reader)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}
