//! Test helpers for composing import inputs and argument sets.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use crate::import::ImportArgs;
use std::fs;
use tempfile::TempDir;

pub(super) const POINT_FEATURE: &str = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[7.42,43.73]},"properties":{"@type":"node","@id":1,"amenity":"cafe"}}"#;
pub(super) const LINE_FEATURE: &str = r#"{"type":"Feature","geometry":{"type":"LineString","coordinates":[[7.42,43.73],[7.43,43.74]]},"properties":{"@type":"way","@id":2,"highway":"residential"}}"#;

/// Temporary directory holding an NDJSON input and a stand-in extract.
#[derive(Debug)]
pub(super) struct InputFiles {
    _dir: TempDir,
    root: Utf8PathBuf,
    ndjson: Utf8PathBuf,
    pbf: Utf8PathBuf,
}

impl InputFiles {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let ndjson = root.join("features.ndjson");
        let pbf = root.join("monaco-latest.osm.pbf");
        fs::write(&ndjson, format!("{POINT_FEATURE}\n{LINE_FEATURE}\n")).expect("write ndjson");
        fs::write(&pbf, b"not really protobuf").expect("write extract");
        Self {
            _dir: dir,
            root,
            ndjson,
            pbf,
        }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn ndjson(&self) -> &Utf8Path {
        &self.ndjson
    }

    pub(super) fn pbf(&self) -> &Utf8Path {
        &self.pbf
    }
}

/// Arguments naming `input` and `collection`, everything else defaulted.
pub(super) fn import_args(input: &Utf8Path, collection: &str) -> ImportArgs {
    ImportArgs {
        input: Some(input.to_path_buf()),
        collection: Some(collection.to_owned()),
        ..ImportArgs::default()
    }
}
