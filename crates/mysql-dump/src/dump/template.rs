//! Text layout of a dump document.
//!
//! ```text
//! -- <banner> <version>
//! --
//! -- ------------------------------------------------------
//! -- Server version	<server version>
//! <drop/create database preamble, or an empty line>
//!
//! USE <database>;
//! SET TIME_ZONE='+00:00';
//! (per table; archive members start with the SET TIME_ZONE line)
//! --
//! -- Table structure for table <name>
//! --
//!
//! DROP TABLE IF EXISTS <name>;
//! <create statement>;
//! (only when the table has rows)
//! --
//! -- Dumping data for table <name>
//! --
//!
//! LOCK TABLES <name> WRITE;
//! INSERT INTO <name> VALUES <rows>;
//! UNLOCK TABLES;
//! (end per table)
//! -- Dump completed on <timestamp>
//! ```
//!
//! Names and statements are inserted verbatim. TIMESTAMP values are read in
//! UTC, so every restorable unit pins the session time zone to match.

use crate::core::TableRecord;
use crate::error::Result;
use crate::sink::{OutputMode, Sink};

/// Session time zone TIMESTAMP values are read and restored in.
pub const DUMP_TIME_ZONE: &str = "+00:00";

/// Banner and version printed at the top of every dump.
///
/// Passed to the writer at construction so dumps with different banners can
/// run side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFormat {
    /// Tool name shown in the first line.
    pub banner: String,

    /// Tool version shown after the banner.
    pub version: String,
}

impl Default for DumpFormat {
    fn default() -> Self {
        Self {
            banner: "Rust SQL Dump".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Values rendered into the document header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpHeader {
    /// Server version string.
    pub server_version: String,

    /// Database the dump switches to with `USE`.
    pub database: String,

    /// Emit `DROP DATABASE` / `CREATE DATABASE` before `USE`.
    pub drop_database: bool,
}

impl DumpFormat {
    /// Render the header.
    pub fn render_header(&self, header: &DumpHeader) -> String {
        let preamble = if header.drop_database {
            format!(
                "DROP DATABASE IF EXISTS {db};\nCREATE DATABASE {db};SET FOREIGN_KEY_CHECKS=0;",
                db = header.database
            )
        } else {
            String::new()
        };

        format!(
            "-- {} {}\n\
             --\n\
             -- ------------------------------------------------------\n\
             -- Server version\t{}\n\
             {}\n\
             \n\
             USE {};\n\
             {}",
            self.banner,
            self.version,
            header.server_version,
            preamble,
            header.database,
            self.render_time_zone()
        )
    }

    /// Render the statement that pins the session time zone.
    pub fn render_time_zone(&self) -> String {
        format!("SET TIME_ZONE='{}';\n", DUMP_TIME_ZONE)
    }

    /// Render the block of one table.
    pub fn render_table(&self, table: &TableRecord) -> String {
        let name = &table.name;
        let mut out = format!(
            "\n--\n-- Table structure for table {name}\n--\n\n\
             DROP TABLE IF EXISTS {name};\n\
             {};\n",
            table.create_statement
        );

        if table.has_data() {
            out.push_str(&format!(
                "\n--\n-- Dumping data for table {name}\n--\n\n\
                 LOCK TABLES {name} WRITE;\n\
                 INSERT INTO {name} VALUES {};\n\
                 UNLOCK TABLES;\n",
                table.values
            ));
        }

        out
    }

    /// Render the footer.
    pub fn render_footer(&self, completed_at: &str) -> String {
        format!("\n-- Dump completed on {}\n", completed_at)
    }
}

/// Writes a dump document into a [`Sink`].
pub struct DocumentWriter<'s> {
    format: DumpFormat,
    sink: &'s mut Sink,
}

impl<'s> DocumentWriter<'s> {
    pub fn new(format: DumpFormat, sink: &'s mut Sink) -> Self {
        Self { format, sink }
    }

    pub fn write_header(&mut self, header: &DumpHeader) -> Result<()> {
        let text = self.format.render_header(header);
        self.sink.write_str(&text)
    }

    /// Write one table; in archive mode it becomes its own member.
    pub fn write_table(&mut self, table: &TableRecord) -> Result<()> {
        self.sink.begin_table(&table.name)?;
        if self.sink.mode() == OutputMode::Zip {
            let pin = self.format.render_time_zone();
            self.sink.write_str(&pin)?;
        }
        let text = self.format.render_table(table);
        self.sink.write_str(&text)?;
        self.sink.end_table();
        Ok(())
    }

    pub fn write_footer(&mut self, completed_at: &str) -> Result<()> {
        let text = self.format.render_footer(completed_at);
        self.sink.write_str(&text)
    }
}
