//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Build a ZIP in memory from (path, bytes) pairs, in order.
pub fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A `songs`-list config for one song.
pub fn songs_config(id: &str, title: &str) -> Vec<u8> {
    serde_json::json!({
        "songs": [{
            "id": id,
            "title_localized": {"en": title},
            "artist": "Test Artist",
            "bpm": "170",
            "bpm_base": 170.0,
            "set": "testpack",
        }]
    })
    .to_string()
    .into_bytes()
}

/// A complete flat package with a background and the given charts.
pub fn song_package(id: &str, title: &str, charts: &[&str]) -> Vec<u8> {
    let config = songs_config(id, title);
    let mut files: Vec<(&str, &[u8])> = Vec::new();
    files.push(("base.jpg", &b"jpeg-bytes"[..]));
    files.push(("base.ogg", &b"ogg-bytes"[..]));
    files.push(("slst.txt", config.as_slice()));
    files.push(("bg_stage.jpg", &b"bg-bytes"[..]));
    for chart in charts {
        files.push((*chart, &b"(0);"[..]));
    }
    zip_of(&files)
}

/// Read one member of an output package as text.
pub fn read_member(package: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// Member names of an output package, in archive order.
pub fn member_names(package: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    archive.file_names().map(str::to_string).collect()
}
