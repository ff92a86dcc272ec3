//! Raw byte suppliers for the loader, plain or decompressing.
//!
//! A source never raises: failing to open or read is reported once through
//! the log and the source then behaves as an empty stream. Callers that need
//! to tell a failed open from an empty file check [`ByteSource::is_live`].

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bzip2::bufread::MultiBzDecoder;
use flate2::bufread::MultiGzDecoder;
use log::{error, info};
use xz::bufread::XzDecoder;

/// Supplies the bytes of one document.
pub trait ByteSource: Send {
    /// Fill `buf` with the next bytes and return how many were written.
    /// 0 means end of stream and is returned forever after.
    fn fill(&mut self, buf: &mut [u8]) -> usize;

    /// False once the source failed to open or read.
    fn is_live(&self) -> bool {
        true
    }
}

/// Envelope detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Bzip2,
    Xz,
    Gzip,
}

impl Compression {
    /// Look at what follows the last `.` of the path.
    ///
    /// The scan works on the raw bytes of the path, so it may misjudge
    /// encodings where `.` is not a single byte.
    pub fn from_path(path: &Path) -> Self {
        let bytes = path.as_os_str().as_encoded_bytes();
        let extension = match bytes.iter().rposition(|&b| b == b'.') {
            Some(dot) => &bytes[dot..],
            None => return Compression::Plain,
        };
        match extension {
            b".bz2" => Compression::Bzip2,
            b".xz" => Compression::Xz,
            b".gz" => Compression::Gzip,
            _ => Compression::Plain,
        }
    }
}

/// [`ByteSource`] over any reader. `None` inside means dead.
pub struct StreamSource<R> {
    reader: Option<R>,
    label: String,
}

impl<R: Read + Send> StreamSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        StreamSource {
            reader: Some(reader),
            label: label.into(),
        }
    }

    /// A source that failed before producing anything.
    pub fn dead(label: impl Into<String>) -> Self {
        StreamSource {
            reader: None,
            label: label.into(),
        }
    }
}

impl<R: Read + Send> ByteSource for StreamSource<R> {
    fn fill(&mut self, buf: &mut [u8]) -> usize {
        let Some(reader) = self.reader.as_mut() else {
            return 0;
        };
        loop {
            match reader.read(buf) {
                Ok(n) => return n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!(source = self.label.as_str(), err = err.to_string().as_str(); "Read failed, truncating stream");
                    self.reader = None;
                    return 0;
                }
            }
        }
    }

    fn is_live(&self) -> bool {
        self.reader.is_some()
    }
}

/// Open `path`, decompressing according to its extension.
///
/// Never fails: an unreadable file yields a dead, empty source.
pub fn open_source(path: &Path) -> Box<dyn ByteSource> {
    let label = path.display().to_string();
    let compression = Compression::from_path(path);
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            error!(path = label.as_str(), err = err.to_string().as_str(); "Could not open OSM file");
            return Box::new(StreamSource::<File>::dead(label));
        }
    };
    info!(path = label.as_str(), compression = format!("{compression:?}").as_str(); "Opened OSM file");

    match compression {
        Compression::Plain => Box::new(StreamSource::new(file, label)),
        Compression::Bzip2 => Box::new(StreamSource::new(MultiBzDecoder::new(BufReader::new(file)), label)),
        Compression::Xz => Box::new(StreamSource::new(XzDecoder::new(BufReader::new(file)), label)),
        Compression::Gzip => Box::new(StreamSource::new(MultiGzDecoder::new(BufReader::new(file)), label)),
    }
}
