//! File wrapper: a two-string preamble followed by one record stream.

use std::sync::Arc;

use nrbf_codec::{
    build_stream, decode_stream, Node, ParseOptions, Session, WireReader, WireWriter,
};
use serde::Serialize;
use tracing::debug;

use crate::builder::GraphBuilder;
use crate::error::{GraphError, GraphResult};
use crate::linearizer::Linearizer;
use crate::schema::Schema;
use crate::value::Object;
use crate::version::FormatVersion;

/// Leading strings of a document, e.g. `SVIP` and `7.0.0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Preamble {
    pub magic: String,
    pub version: String,
}

impl Preamble {
    pub fn new(magic: impl Into<String>, version: FormatVersion) -> Self {
        Self {
            magic: magic.into(),
            version: version.to_string(),
        }
    }

    /// Magic and version run together, as editors display it (`SVIP7.0.0`).
    pub fn label(&self) -> String {
        format!("{}{}", self.magic, self.version)
    }

    pub fn format_version(&self) -> GraphResult<FormatVersion> {
        self.version.parse()
    }

    fn read(reader: &mut WireReader<'_>) -> GraphResult<Self> {
        let magic = read_short_string(reader, "magic")?;
        let version = read_short_string(reader, "version")?;
        Ok(Self { magic, version })
    }

    fn write(&self, writer: &mut WireWriter) -> GraphResult<()> {
        for part in [&self.magic, &self.version] {
            let len = u8::try_from(part.len()).map_err(|_| {
                GraphError::InvalidPreamble(format!(
                    "{} byte preamble string exceeds one-byte length",
                    part.len()
                ))
            })?;
            writer.write_u8(len);
            writer.write_bytes(part.as_bytes());
        }
        Ok(())
    }
}

/// Preamble strings carry a single length byte, unlike stream strings.
fn read_short_string(reader: &mut WireReader<'_>, what: &str) -> GraphResult<String> {
    let bytes = reader
        .read_u8()
        .and_then(|len| reader.read_bytes(usize::from(len)))
        .map_err(|e| GraphError::InvalidPreamble(format!("{what}: {e}")))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| GraphError::InvalidPreamble(format!("{what}: invalid UTF-8")))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub preamble: Preamble,
    pub root: Arc<Object>,
}

/// Preamble and raw records of a document, without building objects.
pub fn read_records(
    bytes: &[u8],
    options: &ParseOptions,
) -> GraphResult<(Preamble, Vec<Node>, Session)> {
    let mut reader = WireReader::new(bytes);
    let preamble = Preamble::read(&mut reader)?;
    let body = &bytes[reader.offset()..];
    let (records, session) = decode_stream(body, options)?;
    debug!(
        magic = %preamble.magic,
        version = %preamble.version,
        records = records.len(),
        "decoded document stream"
    );
    Ok((preamble, records, session))
}

/// Decode a whole document against `schema`.
pub fn read_document<S: Schema + ?Sized>(
    schema: &S,
    bytes: &[u8],
    options: &ParseOptions,
) -> GraphResult<Document> {
    let (preamble, records, session) = read_records(bytes, options)?;
    let root = GraphBuilder::new(schema, &session).build_root(&records)?;
    Ok(Document { preamble, root })
}

/// Encode a document. Version-gated fields follow the preamble's version.
pub fn write_document<S: Schema + ?Sized>(schema: &S, document: &Document) -> GraphResult<Vec<u8>> {
    let version = document.preamble.format_version()?;
    let records = Linearizer::new(schema, version).write(&document.root)?;
    let mut writer = WireWriter::new();
    document.preamble.write(&mut writer)?;
    let mut bytes = writer.into_bytes();
    bytes.extend_from_slice(&build_stream(&records)?);
    Ok(bytes)
}
