//! PLY reader producing a flat attribute table.
//!
//! Supports `ascii`, `binary_little_endian` and `binary_big_endian` bodies. Only the `vertex`
//! element is kept: every one of its properties becomes one scalar attribute named exactly like
//! the property. Elements before it (faces, edges, ...) are parsed and skipped.

use std::io::{self, Cursor};

use anyhow::{Context, anyhow, bail};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::data_structures::attribute::{AttributeArray, AttributeData, AttributeTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    fn parse(name: &str) -> anyhow::Result<Self> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => bail!("unknown PLY property type {}", other),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub count: usize,
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub elements: Vec<Element>,
    /// Offset of the first body byte.
    pub body_offset: usize,
}

pub fn parse_header(bytes: &[u8]) -> anyhow::Result<PlyHeader> {
    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();
    let mut offset = 0;
    let mut first = true;

    loop {
        let rest = bytes
            .get(offset..)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| anyhow!("PLY header has no end_header line"))?;
        let line_len = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
        let line = std::str::from_utf8(&rest[..line_len])
            .context("PLY header is not valid text")?
            .trim();
        offset += (line_len + 1).min(rest.len());

        if first {
            if line != "ply" {
                bail!("not a PLY file");
            }
            first = false;
            continue;
        }

        let mut words = line.split_whitespace();
        match words.next() {
            Some("end_header") => break,
            Some("format") => {
                format = Some(match words.next() {
                    Some("ascii") => PlyFormat::Ascii,
                    Some("binary_little_endian") => PlyFormat::BinaryLittleEndian,
                    Some("binary_big_endian") => PlyFormat::BinaryBigEndian,
                    other => bail!("unsupported PLY format {:?}", other),
                });
            }
            Some("element") => {
                let name = words.next().ok_or_else(|| anyhow!("element without a name"))?;
                let count = words
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| anyhow!("element {} has no valid count", name))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| anyhow!("property declared before any element"))?;
                let property = match words.next() {
                    Some("list") => {
                        let count = ScalarType::parse(words.next().unwrap_or_default())?;
                        let item = ScalarType::parse(words.next().unwrap_or_default())?;
                        let name = words.next().ok_or_else(|| anyhow!("list without a name"))?;
                        Property {
                            name: name.to_string(),
                            kind: PropertyKind::List { count, item },
                        }
                    }
                    Some(ty) => {
                        let ty = ScalarType::parse(ty)?;
                        let name =
                            words.next().ok_or_else(|| anyhow!("property without a name"))?;
                        Property {
                            name: name.to_string(),
                            kind: PropertyKind::Scalar(ty),
                        }
                    }
                    None => bail!("empty property declaration"),
                };
                element.properties.push(property);
            }
            // comment, obj_info and blank lines
            _ => {}
        }
    }

    Ok(PlyHeader {
        format: format.ok_or_else(|| anyhow!("PLY header has no format line"))?,
        elements,
        body_offset: offset,
    })
}

/// Reads the vertex element of a PLY file into an attribute table.
pub fn read_attribute_table(bytes: &[u8]) -> anyhow::Result<AttributeTable> {
    let header = parse_header(bytes)?;
    let body = &bytes[header.body_offset..];
    match header.format {
        PlyFormat::Ascii => {
            let text = std::str::from_utf8(body).context("ASCII PLY body is not valid text")?;
            read_body(&mut AsciiValues(text.split_ascii_whitespace()), &header.elements)
        }
        PlyFormat::BinaryLittleEndian => read_body(
            &mut BinaryValues::<LittleEndian>::new(body),
            &header.elements,
        ),
        PlyFormat::BinaryBigEndian => {
            read_body(&mut BinaryValues::<BigEndian>::new(body), &header.elements)
        }
    }
}

trait ValueSource {
    fn next_value(&mut self, ty: ScalarType) -> anyhow::Result<f64>;
}

struct AsciiValues<'a>(std::str::SplitAsciiWhitespace<'a>);

impl ValueSource for AsciiValues<'_> {
    fn next_value(&mut self, _: ScalarType) -> anyhow::Result<f64> {
        let token = self.0.next().ok_or_else(|| anyhow!("PLY body is truncated"))?;
        token
            .parse()
            .with_context(|| format!("invalid PLY value {}", token))
    }
}

struct BinaryValues<'a, B> {
    cursor: Cursor<&'a [u8]>,
    order: std::marker::PhantomData<B>,
}

impl<'a, B: ByteOrder> BinaryValues<'a, B> {
    fn new(body: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(body),
            order: std::marker::PhantomData,
        }
    }

    fn read(&mut self, ty: ScalarType) -> io::Result<f64> {
        let cursor = &mut self.cursor;
        Ok(match ty {
            ScalarType::I8 => cursor.read_i8()? as f64,
            ScalarType::U8 => cursor.read_u8()? as f64,
            ScalarType::I16 => cursor.read_i16::<B>()? as f64,
            ScalarType::U16 => cursor.read_u16::<B>()? as f64,
            ScalarType::I32 => cursor.read_i32::<B>()? as f64,
            ScalarType::U32 => cursor.read_u32::<B>()? as f64,
            ScalarType::F32 => cursor.read_f32::<B>()? as f64,
            ScalarType::F64 => cursor.read_f64::<B>()?,
        })
    }
}

impl<B: ByteOrder> ValueSource for BinaryValues<'_, B> {
    fn next_value(&mut self, ty: ScalarType) -> anyhow::Result<f64> {
        self.read(ty).context("PLY body is truncated")
    }
}

enum Column {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

impl Column {
    /// Returns false when the value had to be saturated into the column's type.
    fn push(&mut self, value: f64) -> bool {
        match self {
            Self::U8(values) => {
                values.push(value as u8);
                (0.0..=255.0).contains(&value)
            }
            Self::F32(values) => {
                values.push(value as f32);
                true
            }
        }
    }
}

fn read_body(source: &mut impl ValueSource, elements: &[Element]) -> anyhow::Result<AttributeTable> {
    for element in elements {
        if element.name != "vertex" {
            for _ in 0..element.count {
                for property in &element.properties {
                    skip_property(source, &property.kind)?;
                }
            }
            continue;
        }

        let mut columns = Vec::with_capacity(element.properties.len());
        for property in &element.properties {
            match property.kind {
                PropertyKind::Scalar(ScalarType::U8) => columns.push(Column::U8(Vec::new())),
                PropertyKind::Scalar(_) => columns.push(Column::F32(Vec::new())),
                PropertyKind::List { .. } => {
                    bail!("list property {} in the vertex element is not supported", property.name)
                }
            }
        }
        let mut saturated = vec![0usize; columns.len()];
        for row in 0..element.count {
            for ((property, column), saturated) in element
                .properties
                .iter()
                .zip(columns.iter_mut())
                .zip(saturated.iter_mut())
            {
                if let PropertyKind::Scalar(ty) = property.kind {
                    let value = source
                        .next_value(ty)
                        .with_context(|| format!("reading vertex {} of {}", row, element.count))?;
                    if !column.push(value) {
                        *saturated += 1;
                    }
                }
            }
        }
        for (property, count) in element.properties.iter().zip(&saturated) {
            if *count > 0 {
                log::warn!(
                    "{} value(s) of PLY property {} are out of range for uchar and were clamped",
                    count,
                    property.name
                );
            }
        }

        let table = element
            .properties
            .iter()
            .zip(columns)
            .map(|(property, column)| {
                let array = match column {
                    Column::U8(values) => AttributeArray::from(values),
                    Column::F32(values) => AttributeArray::from(values),
                };
                (property.name.clone(), AttributeData::scalar(array))
            })
            .collect();
        return Ok(table);
    }
    bail!("PLY file has no vertex element")
}

fn skip_property(source: &mut impl ValueSource, kind: &PropertyKind) -> anyhow::Result<()> {
    match kind {
        PropertyKind::Scalar(ty) => {
            source.next_value(*ty)?;
        }
        PropertyKind::List { count, item } => {
            let len = source.next_value(*count)? as usize;
            for _ in 0..len {
                source.next_value(*item)?;
            }
        }
    }
    Ok(())
}
