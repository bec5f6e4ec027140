//! Output destinations for a dump document.
//!
//! A [`Sink`] is the single writer the document writer talks to. It comes in
//! three flavours selected by [`OutputMode`]:
//!
//! - **Plain**: one text stream for the whole dump.
//! - **Gzip**: the same text through a gzip encoder; [`Sink::finish`] writes
//!   the gzip trailer before the file is closed.
//! - **Zip**: one archive member `<table>.sql` per table. Text written outside
//!   a table (the global header and footer) is kept once as the archive
//!   comment.
//!
//! A sink created from a path never touches an existing file: the path is
//! checked up front and the file is opened with `create_new`.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DumpError, Result};

/// How the dump is written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Plain SQL text.
    #[default]
    Plain,
    /// Gzip-compressed SQL text.
    Gzip,
    /// Zip archive with one member per table.
    Zip,
}

impl OutputMode {
    /// File extension a destination in this mode should carry.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Plain => ".sql",
            OutputMode::Gzip => ".sql.gz",
            OutputMode::Zip => ".zip",
        }
    }
}

enum Target {
    Plain(BufWriter<Box<dyn Write + Send>>),
    Gzip(GzEncoder<BufWriter<File>>),
    Zip {
        archive: ZipWriter<File>,
        comment: String,
        member: Option<String>,
    },
}

/// The writable destination of one dump.
pub struct Sink {
    destination: Option<PathBuf>,
    mode: OutputMode,
    target: Target,
}

impl Sink {
    /// Create a new destination file in the given mode.
    ///
    /// # Errors
    ///
    /// - [`DumpError::DestinationExists`] if `path` already exists; nothing
    ///   is written in that case
    /// - [`DumpError::Sink`] if the file cannot be created
    pub fn create(path: impl AsRef<Path>, mode: OutputMode) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DumpError::DestinationExists {
                path: path.to_path_buf(),
            });
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    DumpError::DestinationExists {
                        path: path.to_path_buf(),
                    }
                } else {
                    DumpError::sink(e, format!("creating {}", path.display()))
                }
            })?;

        let target = match mode {
            OutputMode::Plain => {
                let inner: Box<dyn Write + Send> = Box::new(file);
                Target::Plain(BufWriter::new(inner))
            }
            OutputMode::Gzip => {
                Target::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default()))
            }
            OutputMode::Zip => Target::Zip {
                archive: ZipWriter::new(file),
                comment: String::new(),
                member: None,
            },
        };

        debug!("Created {:?} sink at {}", mode, path.display());
        Ok(Self {
            destination: Some(path.to_path_buf()),
            mode,
            target,
        })
    }

    /// Plain sink over an arbitrary writer. There is no destination path, so
    /// no collision check applies.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        let inner: Box<dyn Write + Send> = Box::new(writer);
        Self {
            destination: None,
            mode: OutputMode::Plain,
            target: Target::Plain(BufWriter::new(inner)),
        }
    }

    /// Path of the destination file, if the sink owns one.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Output mode this sink writes.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Whether each table is written as its own archive member.
    pub fn is_archive(&self) -> bool {
        matches!(self.target, Target::Zip { .. })
    }

    /// Start writing the block of `table`.
    ///
    /// In archive mode this finalizes the previous member and opens
    /// `<table>.sql`; the other modes keep writing to the same stream.
    pub fn begin_table(&mut self, table: &str) -> Result<()> {
        if let Target::Zip {
            archive, member, ..
        } = &mut self.target
        {
            let name = format!("{}.sql", table);
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            archive
                .start_file(name.as_str(), options)
                .map_err(|e| DumpError::sink(io::Error::other(e), format!("adding {}", name)))?;
            *member = Some(name);
        }
        Ok(())
    }

    /// Stop writing the block of the current table.
    ///
    /// Later writes in archive mode go to the archive comment again.
    pub fn end_table(&mut self) {
        if let Target::Zip { member, .. } = &mut self.target {
            *member = None;
        }
    }

    /// Write `text` to the current writer.
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write_all(text.as_bytes())
            .map_err(|e| DumpError::sink(e, self.describe()))
    }

    fn describe(&self) -> String {
        match (&self.target, &self.destination) {
            (Target::Zip { member: Some(m), .. }, _) => format!("writing archive member {}", m),
            (_, Some(path)) => format!("writing {}", path.display()),
            (_, None) => "writing dump stream".to_string(),
        }
    }

    /// Flush and finalize the destination.
    ///
    /// Writes the gzip trailer or the zip central directory (with the archive
    /// comment) and closes the file.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        let context = match &self.destination {
            Some(path) => format!("finalizing {}", path.display()),
            None => "finalizing dump stream".to_string(),
        };
        match self.target {
            Target::Plain(mut writer) => {
                writer.flush().map_err(|e| DumpError::sink(e, context))?;
            }
            Target::Gzip(encoder) => {
                let mut inner = encoder.finish().map_err(|e| DumpError::sink(e, context.clone()))?;
                inner.flush().map_err(|e| DumpError::sink(e, context))?;
            }
            Target::Zip {
                mut archive,
                comment,
                ..
            } => {
                archive.set_comment(comment);
                let file = archive
                    .finish()
                    .map_err(|e| DumpError::sink(io::Error::other(e), context.clone()))?;
                file.sync_all().map_err(|e| DumpError::sink(e, context))?;
            }
        }
        Ok(self.destination)
    }

    /// Abandon the dump.
    ///
    /// The destination file created by this sink is removed so no
    /// complete-looking dump is left behind. Removal problems are logged.
    pub fn abort(self) {
        let Sink {
            destination,
            target,
            ..
        } = self;
        drop(target);
        if let Some(path) = destination {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed incomplete dump {}", path.display()),
                Err(e) => warn!("Could not remove incomplete dump {}: {}", path.display(), e),
            }
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.target {
            Target::Plain(w) => w.write(buf),
            Target::Gzip(w) => w.write(buf),
            Target::Zip {
                archive,
                comment,
                member,
            } => {
                if member.is_some() {
                    archive.write(buf)
                } else {
                    let text = std::str::from_utf8(buf)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    comment.push_str(text);
                    Ok(buf.len())
                }
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            Target::Plain(w) => w.flush(),
            Target::Gzip(w) => w.flush(),
            Target::Zip { archive, .. } => archive.flush(),
        }
    }
}
