#![allow(dead_code)]

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use splat_roam::{
    data_structures::attribute::{AttributeArray, AttributeData, AttributeTable},
    resources::{gltf_loader::parse_document, mesh::RawGraph},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Little-endian bytes of `values`.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes
            .write_f32::<LittleEndian>(*value)
            .expect("writing to a Vec cannot fail");
    }
    bytes
}

/// Packs a `.glb` container with a JSON chunk and an optional BIN chunk.
pub fn glb(json: &serde_json::Value, bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = serde_json::to_vec(json).expect("fixture JSON serializes");
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = bin.map(|bin| {
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        bin
    });

    let total = 12 + 8 + json.len() + bin.as_ref().map_or(0, |bin| 8 + bin.len());
    let mut out = Vec::with_capacity(total);
    out.write_all(b"glTF").unwrap();
    out.write_u32::<LittleEndian>(2).unwrap();
    out.write_u32::<LittleEndian>(total as u32).unwrap();
    out.write_u32::<LittleEndian>(json.len() as u32).unwrap();
    out.write_all(b"JSON").unwrap();
    out.write_all(&json).unwrap();
    if let Some(bin) = bin {
        out.write_u32::<LittleEndian>(bin.len() as u32).unwrap();
        out.write_all(b"BIN\0").unwrap();
        out.write_all(&bin).unwrap();
    }
    out
}

/// A raw mesh graph with a single buffer.
pub fn raw_graph(json: &serde_json::Value, buffer: Vec<u8>) -> RawGraph {
    let document = parse_document(&serde_json::to_vec(json).unwrap()).expect("fixture parses");
    RawGraph {
        document,
        buffers: vec![buffer],
    }
}

pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// JSON for one mesh with one primitive whose POSITION is accessor 0 (three float VEC3s
/// at the start of buffer 0). `extra` attributes are merged into the primitive.
pub fn triangle_json(buffer_len: usize, extra: serde_json::Value) -> serde_json::Value {
    let mut attributes = serde_json::json!({ "POSITION": 0 });
    if let (Some(attributes), Some(extra)) = (attributes.as_object_mut(), extra.as_object()) {
        attributes.extend(extra.clone());
    }
    serde_json::json!({
        "asset": { "version": "2.0" },
        "meshes": [{ "name": "triangle", "primitives": [{ "attributes": attributes }] }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "buffers": [{ "byteLength": buffer_len }]
    })
}

pub fn f32_attribute(values: &[f32], item_size: usize) -> AttributeData {
    AttributeData::new(values.to_vec(), item_size)
}

pub fn u8_attribute(values: &[u8], item_size: usize) -> AttributeData {
    AttributeData::new(values.to_vec(), item_size)
}

pub fn table(entries: Vec<(&str, AttributeData)>) -> AttributeTable {
    entries
        .into_iter()
        .map(|(name, data)| (name.to_string(), data))
        .collect()
}

pub fn as_f32(array: &AttributeArray) -> Vec<f32> {
    (0..array.len()).filter_map(|i| array.get_f32(i)).collect()
}
