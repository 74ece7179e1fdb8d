//! Bidirectional term dictionary
//!
//! Maps term text to a dense [`TermId`] and back. Ids are assigned in order of
//! first insertion starting from zero and are never reused, so they index the
//! per-term metadata arrays directly.

use std::hash::BuildHasherDefault;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use lasso::{Key, Rodeo, Spur};
use rustc_hash::FxHasher;

use crate::{Error, Result, TermId};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

pub struct TermDictionary {
    interner: Rodeo<Spur, FxBuildHasher>,
}

impl Default for TermDictionary {
    fn default() -> Self {
        Self {
            interner: Rodeo::with_hasher(FxBuildHasher::default()),
        }
    }
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `text`, assigning the next id on first sight.
    ///
    /// Fails only when the 32-bit id space is exhausted.
    pub fn insert_term(&mut self, text: &str) -> Result<TermId> {
        self.interner
            .try_get_or_intern(text)
            .map(|key| key.into_usize() as TermId)
            .map_err(|e| Error::Config(format!("term dictionary full: {}", e)))
    }

    /// Id of `text` if it was ever inserted
    #[inline]
    pub fn term_id(&self, text: &str) -> Option<TermId> {
        self.interner.get(text).map(|key| key.into_usize() as TermId)
    }

    /// Text of a previously issued id
    pub fn term_text(&self, id: TermId) -> Option<&str> {
        let key = Spur::try_from_usize(id as usize)?;
        self.interner.try_resolve(&key)
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }

    /// Terms in id order
    pub fn iter(&self) -> impl Iterator<Item = (TermId, &str)> {
        self.interner
            .iter()
            .map(|(key, text)| (key.into_usize() as TermId, text))
    }

    /// Serialize as a count followed by length-prefixed UTF-8 terms in id order
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.len() as u32)?;
        for (_, text) in self.iter() {
            writer.write_u32::<LittleEndian>(text.len() as u32)?;
            writer.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        let mut dict = Self::new();
        let mut bytes = Vec::new();
        for expected in 0..count {
            let len = reader.read_u32::<LittleEndian>()? as usize;
            bytes.clear();
            reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
            if bytes.len() != len {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| Error::Corruption(format!("term {} is not UTF-8: {}", expected, e)))?;
            let id = dict.insert_term(text)?;
            if id as usize != expected {
                return Err(Error::Corruption(format!(
                    "duplicate term {:?} in dictionary stream",
                    text
                )));
            }
        }
        Ok(dict)
    }
}
