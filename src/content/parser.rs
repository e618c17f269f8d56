// src/content/parser.rs

//! Release payload parsing

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Product, ReleaseContentModel};
use crate::error::{Error, Result};

/// Turns an extracted `data` directory into an unannotated release record
pub trait ContentParser: Send + Sync {
    fn parse(&self, data_dir: &Path) -> Result<ReleaseContentModel>;
}

/// Attributes tried, in order, for a product's display name
const PRODUCT_NAME_ATTRIBUTES: &[&str] = &["Text", "Name", "Id"];

/// Parses the product definition XML shipped in a release
///
/// The definition is the `*.xml` file directly inside the data directory.
/// When several exist, the one with the shortest stem wins.
#[derive(Debug, Default, Clone)]
pub struct XmlContentParser;

impl XmlContentParser {
    pub fn new() -> Self {
        Self
    }

    fn find_definition(data_dir: &Path) -> Result<PathBuf> {
        if !data_dir.is_dir() {
            return Err(Error::ParseError(format!(
                "data directory {} does not exist",
                data_dir.display()
            )));
        }

        let mut candidates: Vec<PathBuf> = WalkDir::new(data_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
            })
            .collect();

        candidates.sort_by_key(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            (stem.len(), stem)
        });

        let mut candidates = candidates.into_iter();
        let chosen = candidates.next().ok_or_else(|| {
            Error::ParseError(format!("no definition file in {}", data_dir.display()))
        })?;
        for ignored in candidates {
            warn!("Ignoring additional definition file {}", ignored.display());
        }
        Ok(chosen)
    }
}

fn product_name(element: &BytesStart<'_>) -> Result<Option<String>> {
    for attribute in PRODUCT_NAME_ATTRIBUTES {
        let value = element
            .try_get_attribute(*attribute)
            .map_err(|e| Error::ParseError(format!("bad Product attribute: {e}")))?;
        if let Some(value) = value {
            let text = value
                .unescape_value()
                .map_err(|e| Error::ParseError(format!("bad {attribute} value: {e}")))?;
            if !text.trim().is_empty() {
                return Ok(Some(text.trim().to_string()));
            }
        }
    }
    Ok(None)
}

/// Collect the names of all `Product` elements in a definition document
pub fn parse_products(xml: &str) -> Result<Vec<Product>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut products = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                if element.local_name().as_ref() != b"Product" {
                    continue;
                }
                match product_name(&element)? {
                    Some(name) => products.push(Product::new(name)),
                    None => debug!("Skipping unnamed Product element"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "invalid XML at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            Ok(_) => {}
        }
    }
    Ok(products)
}

impl ContentParser for XmlContentParser {
    fn parse(&self, data_dir: &Path) -> Result<ReleaseContentModel> {
        let xml_file = Self::find_definition(data_dir)?;
        debug!("Parsing definition {}", xml_file.display());

        let content = fs::read_to_string(&xml_file).map_err(|e| {
            Error::ParseError(format!("Failed to read {}: {e}", xml_file.display()))
        })?;
        let products = parse_products(&content)?;

        let model = ReleaseContentModel::new(xml_file, products);
        model.validate()?;
        Ok(model)
    }
}
