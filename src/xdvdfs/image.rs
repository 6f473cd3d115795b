use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, Write},
    marker::PhantomData,
    path::Path,
    sync::Arc,
};

use crate::xdvdfs::{
    Directory, DirectoryEntry, ExtractionReport, Result, SECTOR_SIZE, Sector, SectorIndex,
    decode_directory, extract, read_sector, sector_from_byte_offset, sector_offset, stream_length,
};

/// A raw disc image. Every operation opens its own reader through the
/// factory, so an `Image` can be shared between threads.
pub struct Image<R: Read + Seek, F: Fn() -> io::Result<R>> {
    reader_factory: Arc<F>,
    length: u64,
    _reader: PhantomData<fn() -> R>,
}

impl<R: Read + Seek, F: Fn() -> io::Result<R>> Clone for Image<R, F> {
    fn clone(&self) -> Self {
        Self {
            reader_factory: Arc::clone(&self.reader_factory),
            length: self.length,
            _reader: PhantomData,
        }
    }
}

impl<R: Read + Seek, F: Fn() -> io::Result<R>> std::fmt::Debug for Image<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image").field("length", &self.length).finish()
    }
}

/// Boxed factory used by [`FileImage`].
pub type FileReaderFactory = Box<dyn Fn() -> io::Result<BufReader<File>> + Send + Sync>;

/// An image backed by a file on disk.
pub type FileImage = Image<BufReader<File>, FileReaderFactory>;

impl FileImage {
    /// Open the image at `path`. Fails if the file cannot be opened now.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let factory: FileReaderFactory =
            Box::new(move || File::open(&path).map(BufReader::new));
        Image::new(factory)
    }
}

impl<R: Read + Seek, F: Fn() -> io::Result<R>> Image<R, F> {
    /// Create an image from a reader factory. One reader is opened right away
    /// to learn the image length.
    pub fn new(reader_factory: F) -> Result<Self> {
        let mut reader = reader_factory()?;
        let length = stream_length(&mut reader)?;

        Ok(Self {
            reader_factory: Arc::new(reader_factory),
            length,
            _reader: PhantomData,
        })
    }

    /// Open a new, independent reader
    pub fn reader(&self) -> Result<R> {
        Ok((self.reader_factory)()?)
    }

    /// Image length in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Number of whole sectors in the image
    pub fn sector_count(&self) -> u64 {
        self.length / SECTOR_SIZE as u64
    }

    /// Whether the first byte of `sector` lies inside the image.
    pub fn contains_sector(&self, sector: SectorIndex) -> bool {
        sector_offset(sector).is_ok_and(|offset| offset < self.length)
    }

    pub fn read_sector(&self, sector: SectorIndex) -> Result<Sector> {
        let mut reader = self.reader()?;
        read_sector(&mut reader, sector)
    }

    pub fn read_directory(&self, sector: SectorIndex) -> Result<Directory> {
        let mut reader = self.reader()?;
        decode_directory(&mut reader, sector)
    }

    /// Decode the directory table containing byte `offset`.
    pub fn read_directory_at(&self, offset: u64) -> Result<Directory> {
        self.read_directory(sector_from_byte_offset(offset))
    }

    pub fn extract_entry<W: Write>(
        &self,
        entry: &DirectoryEntry,
        sink: &mut W,
    ) -> Result<ExtractionReport> {
        let mut reader = self.reader()?;
        extract(&mut reader, entry, sink)
    }
}
