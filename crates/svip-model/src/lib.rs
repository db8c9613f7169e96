//! X Studio `.svip` projects.
//!
//! An `.svip` file is a `SVIP` magic and version string followed by one NRBF
//! record stream whose root is a `SingingTool.Model.AppModel`. This crate
//! supplies the schema for that stream and the file-level entry points:
//!
//! - [`read`] / [`read_file`]: bytes to `(version label, root)`
//! - [`write`] / [`write_file`]: root and label back to bytes
//! - [`project`]: builders for the objects the editor creates, and a summary
//! - [`line`]: parameter curve blobs
//! - [`config`]: output version selection

pub mod config;
pub mod error;
pub mod line;
pub mod project;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use nrbf_codec::ParseOptions;
use nrbf_graph::{read_document, write_document, Document, Object, Preamble};
use tracing::{debug, info};

pub use config::{normalize_label, OutputVersion, SvipConfig};
pub use error::{SvipError, SvipResult};
pub use project::ProjectSummary;
pub use schema::{XStudio, XsClass};

/// Magic string at the start of every project file.
pub const MAGIC: &str = "SVIP";

/// Decode a project. Returns the version label (e.g. `SVIP7.0.0`) and the root.
pub fn read(bytes: &[u8]) -> SvipResult<(String, Arc<Object>)> {
    read_with(bytes, &ParseOptions::default())
}

pub fn read_with(bytes: &[u8], options: &ParseOptions) -> SvipResult<(String, Arc<Object>)> {
    let document = read_document(&XStudio, bytes, options)?;
    if XsClass::of(document.root.class()) != Some(XsClass::AppModel) {
        return Err(SvipError::Shape(format!(
            "root is {}, not an app model",
            document.root.class().name
        )));
    }
    let label = document.preamble.label();
    debug!(%label, bytes = bytes.len(), "read project");
    Ok((label, document.root))
}

/// Encode a project under `label`. Malformed labels fall back to `SVIP6.0.0`.
pub fn write(root: &Arc<Object>, label: &str) -> SvipResult<Vec<u8>> {
    let label = normalize_label(label);
    // normalize_label only returns SVIP-prefixed labels
    let version = label.strip_prefix(MAGIC).unwrap_or("6.0.0").to_owned();
    let document = Document {
        preamble: Preamble {
            magic: MAGIC.to_owned(),
            version,
        },
        root: Arc::clone(root),
    };
    let bytes = write_document(&XStudio, &document)?;
    debug!(%label, bytes = bytes.len(), "wrote project");
    Ok(bytes)
}

pub fn read_file(path: impl AsRef<Path>) -> SvipResult<(String, Arc<Object>)> {
    read_file_with(path, &ParseOptions::default())
}

pub fn read_file_with(
    path: impl AsRef<Path>,
    options: &ParseOptions,
) -> SvipResult<(String, Arc<Object>)> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    info!(path = %path.display(), "reading project");
    read_with(&bytes, options)
}

pub fn write_file(path: impl AsRef<Path>, root: &Arc<Object>, label: &str) -> SvipResult<()> {
    let path = path.as_ref();
    let bytes = write(root, label)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote project");
    Ok(())
}
