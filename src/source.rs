use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use memmap2::Mmap;

/// Where the reader pulls bytes from: a plain file, or the same file mapped
/// into memory.
pub enum Input {
    File(File),
    Mapped { mmap: Mmap, offset: usize },
}

impl Input {
    pub fn open(path: &Path, mmap: bool) -> io::Result<Self> {
        let file = File::open(path)?;
        // Mapping a zero-length file fails on some platforms.
        if !mmap || file.metadata()?.len() == 0 {
            return Ok(Input::File(file));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Input::Mapped { mmap, offset: 0 })
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Input::Mapped { .. })
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::File(file) => file.read(buf),
            Input::Mapped { mmap, offset } => {
                let mut rest = &mmap[(*offset).min(mmap.len())..];
                let n = rest.read(buf)?;
                *offset += n;
                Ok(n)
            }
        }
    }
}
