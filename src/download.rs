//! Download target handling.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::Error;

/// How a local download target is opened.
///
/// The legacy stream-mode strings collapse to the two modes that ever had
/// callers: truncate-and-write (`w+`) and append (`a+`). Both create the file
/// when it does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileMode {
    #[default]
    Truncate,
    Append,
}

impl FileMode {
    pub(crate) fn open(self, path: &Path) -> io::Result<File> {
        match self {
            FileMode::Truncate => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
            FileMode::Append => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path),
        }
    }
}

/// Opens `path` as a download target, mapping failure to [`Error::File`].
pub(crate) fn open_target(path: &Path, mode: FileMode) -> Result<File, Error> {
    mode.open(path).map_err(|source| Error::File {
        path: path.to_path_buf(),
        source,
    })
}
