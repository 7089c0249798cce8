use crate::{
    error::{IoContext, SfxError},
    types::{FromUsize, Int},
    util::slice_u8_to_vec,
};
use anyhow::{bail, Result};
use std::{
    cmp::min,
    fs::File,
    io::{Read, Seek, SeekFrom},
    mem,
    ops::Range,
    path::{Path, PathBuf},
};

// --------------------------------------------------
/// Buffered random and sequential access to a file of `T` values
#[derive(Debug)]
pub struct FileAccess<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    path: PathBuf,
    file: File,
    buffer: Vec<T>,
    buffer_size: usize,
    buffer_pos: usize,
    pub num_elements: usize,
    start_position: u64,
    current_position: u64,
    end_position: u64,
    exhausted: bool,
}

impl<T> FileAccess<T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    pub fn new(path: &Path, start: u64, num_elements: usize) -> Result<Self> {
        let file = File::open(path).with_path(path.display())?;
        let size = num_elements * mem::size_of::<T>();
        Ok(FileAccess {
            path: path.to_path_buf(),
            file,
            buffer: vec![],
            buffer_size: 1 << 20,
            buffer_pos: 0,
            num_elements,
            start_position: start,
            current_position: start,
            end_position: start + size as u64,
            exhausted: false,
        })
    }

    /// Access every value in the file
    pub fn open(path: &Path) -> Result<Self> {
        let len = std::fs::metadata(path).with_path(path.display())?.len() as usize;
        if len % mem::size_of::<T>() != 0 {
            bail!(SfxError::io(
                path.display(),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("size {len} is not a multiple of {}", mem::size_of::<T>()),
                ),
            ));
        }
        Self::new(path, 0, len / mem::size_of::<T>())
    }

    pub fn reset(&mut self) {
        self.buffer = vec![];
        self.buffer_pos = 0;
        self.current_position = self.start_position;
        self.exhausted = false;
    }

    pub fn iter(&mut self) -> FileAccessIter<T> {
        FileAccessIter { file_access: self }
    }

    // --------------------------------------------------
    pub fn get(&mut self, pos: usize) -> Result<Option<T>> {
        if pos >= self.num_elements {
            return Ok(None);
        }
        let seek = self.start_position + (pos * mem::size_of::<T>()) as u64;
        self.file
            .seek(SeekFrom::Start(seek))
            .with_path(self.path.display())?;
        let mut buffer: Vec<u8> = vec![0; mem::size_of::<T>()];
        self.file
            .read_exact(&mut buffer)
            .with_path(self.path.display())?;
        Ok(slice_u8_to_vec(&buffer, 1).first().copied())
    }

    // --------------------------------------------------
    pub fn get_range(&mut self, range: Range<usize>) -> Result<Vec<T>> {
        if range.start > range.end || range.end > self.num_elements {
            bail!("Invalid range: {range:?}")
        }
        let start = self.start_position + (range.start * mem::size_of::<T>()) as u64;
        self.file
            .seek(SeekFrom::Start(start))
            .with_path(self.path.display())?;
        let mut buffer: Vec<u8> = vec![0; range.len() * mem::size_of::<T>()];
        self.file
            .read_exact(&mut buffer)
            .with_path(self.path.display())?;
        Ok(slice_u8_to_vec(&buffer, range.len()))
    }

    // --------------------------------------------------
    fn fill_buffer(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.current_position))
            .with_path(self.path.display())?;
        let bytes_wanted = min(
            self.buffer_size * mem::size_of::<T>(),
            (self.end_position - self.current_position) as usize,
        );
        let mut buffer: Vec<u8> = vec![0; bytes_wanted];
        self.file
            .read_exact(&mut buffer)
            .with_path(self.path.display())?;
        self.current_position += bytes_wanted as u64;
        self.buffer = slice_u8_to_vec(&buffer, bytes_wanted / mem::size_of::<T>());
        self.buffer_pos = 0;
        Ok(())
    }
}

// --------------------------------------------------
#[derive(Debug)]
pub struct FileAccessIter<'a, T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    file_access: &'a mut FileAccess<T>,
}

impl<T> Iterator for FileAccessIter<'_, T>
where
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let fa = &mut *self.file_access;
        if fa.exhausted {
            return None;
        }

        if fa.buffer_pos == fa.buffer.len() {
            if fa.current_position >= fa.end_position {
                fa.exhausted = true;
                return None;
            }
            if let Err(e) = fa.fill_buffer() {
                fa.exhausted = true;
                return Some(Err(e));
            }
        }

        let val = fa.buffer.get(fa.buffer_pos).copied();
        fa.buffer_pos += 1;
        val.map(Ok)
    }
}
