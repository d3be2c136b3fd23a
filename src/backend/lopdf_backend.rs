//! [`PdfBackend`] backed by `lopdf`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use image::RgbImage;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use super::raster::{self, ColorSpace, Flip};
use super::{BackendLoader, ImagePlacement, Matrix, PdfBackend};
use crate::detect::sniff_version;
use crate::error::{Error, Result};
use crate::model::{BoundingBox, DocumentInfo};

/// Letter size, used when a page declares no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against cyclic `/Parent` chains and reference loops.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Opens documents with [`LopdfBackend::load_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfLoader;

impl BackendLoader for LopdfLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn PdfBackend>> {
        Ok(Box::new(LopdfBackend::load_file(path)?))
    }
}

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: Vec<ObjectId>,
}

/// An image placement together with the XObject that draws it.
struct ResolvedPlacement {
    object_id: ObjectId,
    placement: ImagePlacement,
    flip: Flip,
}

impl LopdfBackend {
    /// Load from a file path.
    ///
    /// The header is checked before parsing so that non-PDF input is
    /// reported as [`Error::UnknownFormat`] rather than a parse error.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        sniff_version(path)?;
        let doc = LopdfDocument::load(path)?;
        Self::from_document(doc)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        crate::detect::sniff_version_bytes(data)?;
        let doc = LopdfDocument::load_mem(data)?;
        Self::from_document(doc)
    }

    fn from_document(doc: LopdfDocument) -> Result<Self> {
        // lopdf strips /Encrypt once an empty user password succeeds
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(Error::PageOutOfRange(index, self.pages.len()))
    }

    /// Follow a reference to the object it points at.
    fn resolve<'a>(&'a self, mut obj: &'a Object) -> Result<&'a Object> {
        for _ in 0..MAX_INHERITANCE_DEPTH {
            match obj {
                Object::Reference(id) => obj = self.doc.get_object(*id)?,
                other => return Ok(other),
            }
        }
        Err(Error::PdfParse("reference chain too deep".to_string()))
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj).ok()? {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Look up a page attribute, walking up the page tree for inheritable
    /// keys like `/Resources` and `/MediaBox`.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get(b"Parent").ok()?;
            dict = self.resolve_dict(parent)?;
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let values = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| self.resolve(obj).ok())
            .and_then(|obj| obj.as_array().ok())
            .map(|arr| arr.iter().filter_map(get_number).collect::<Vec<_>>());

        match values.as_deref() {
            Some([x0, y0, x1, y1, ..]) => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    /// Image XObjects reachable from the page's resources, by name.
    fn image_xobjects(&self, page_id: ObjectId) -> BTreeMap<Vec<u8>, ObjectId> {
        let mut images = BTreeMap::new();

        let xobjects = self
            .inherited(page_id, b"Resources")
            .and_then(|res| self.resolve_dict(res))
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|xobj| self.resolve_dict(xobj));

        if let Some(xobjects) = xobjects {
            for (name, obj) in xobjects.iter() {
                let Ok(id) = obj.as_reference() else { continue };
                if let Ok(Object::Stream(stream)) = self.doc.get_object(id) {
                    let is_image = stream
                        .dict
                        .get(b"Subtype")
                        .and_then(Object::as_name)
                        .map(|s| s == b"Image")
                        .unwrap_or(false);
                    if is_image {
                        images.insert(name.clone(), id);
                    }
                }
            }
        }

        images
    }

    /// Concatenated, decoded content streams of a page.
    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => self.resolve(contents)?,
            // A page without content is blank, not broken
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Stream(stream) => stream_bytes(stream),
            Object::Array(parts) => {
                let mut content = Vec::new();
                for part in parts {
                    if let Object::Stream(stream) = self.resolve(part)? {
                        content.extend_from_slice(&stream_bytes(stream)?);
                        content.push(b' ');
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("invalid page content stream".to_string())),
        }
    }

    /// Walk the content stream, tracking the CTM through `q`/`Q`/`cm`, and
    /// record every `Do` that paints an image XObject.
    fn placements(&self, index: usize) -> Result<Vec<ResolvedPlacement>> {
        let page_id = self.page_id(index)?;
        let xobjects = self.image_xobjects(page_id);
        if xobjects.is_empty() {
            return Ok(Vec::new());
        }

        let content = lopdf::content::Content::decode(&self.page_content(page_id)?)?;
        let [x0, _, _, y1] = self.media_box(page_id);

        let mut placements = Vec::new();
        let mut stack: Vec<Matrix> = Vec::new();
        let mut ctm = Matrix::IDENTITY;

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => ctm = stack.pop().unwrap_or(Matrix::IDENTITY),
                "cm" => {
                    let values: Vec<f32> = op.operands.iter().filter_map(get_number).collect();
                    if let [a, b, c, d, e, f] = values[..] {
                        ctm = Matrix::new(a, b, c, d, e, f).concat(&ctm);
                    }
                }
                "Do" => {
                    let Some(Object::Name(name)) = op.operands.first() else {
                        continue;
                    };
                    let Some(&object_id) = xobjects.get(name) else {
                        continue;
                    };
                    // Flip from PDF's bottom-left origin to top-left
                    let corners = ctm.unit_square().map(|(x, y)| (x - x0, y1 - y));
                    let Some(bbox) = BoundingBox::enclosing(corners) else {
                        continue;
                    };
                    placements.push(ResolvedPlacement {
                        object_id,
                        placement: ImagePlacement::new(String::from_utf8_lossy(name), bbox),
                        flip: Flip {
                            horizontal: ctm.a < 0.0,
                            vertical: ctm.d < 0.0,
                        },
                    });
                }
                _ => {}
            }
        }

        Ok(placements)
    }

    /// Decode an image XObject to RGB.
    fn decode_image(&self, object_id: ObjectId) -> Result<RgbImage> {
        let stream = match self.doc.get_object(object_id)? {
            Object::Stream(stream) => stream,
            _ => return Err(Error::ImageExtract("image XObject is not a stream".into())),
        };
        let dict = &stream.dict;

        let width = dict_u32(dict, b"Width")?;
        let height = dict_u32(dict, b"Height")?;
        let filters = self.filters(dict);

        if filters.last().map(Vec::as_slice) == Some(b"DCTDecode".as_slice()) {
            if filters.len() > 1 {
                return Err(Error::ImageExtract(
                    "chained filters before DCTDecode are not supported".into(),
                ));
            }
            return raster::decode_jpeg(&stream.content);
        }
        if let Some(unsupported) = filters
            .iter()
            .find(|f| !matches!(f.as_slice(), b"FlateDecode" | b"LZWDecode" | b"Fl" | b"LZW"))
        {
            return Err(Error::ImageExtract(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(unsupported)
            )));
        }

        let data = stream_bytes(stream)?;

        let is_mask = dict
            .get(b"ImageMask")
            .and_then(Object::as_bool)
            .unwrap_or(false);
        if is_mask {
            return raster::decode_bilevel(width, height, &data);
        }

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(get_number)
            .map(|b| b as u8)
            .unwrap_or(8);
        let color_space = match dict.get(b"ColorSpace") {
            Ok(cs) => self.color_space(cs, 0)?,
            Err(_) => ColorSpace::Gray,
        };

        raster::decode_samples(width, height, bits, &color_space, &data)
    }

    fn filters(&self, dict: &Dictionary) -> Vec<Vec<u8>> {
        match dict.get(b"Filter").map(|f| self.resolve(f)) {
            Ok(Ok(Object::Name(name))) => vec![name.clone()],
            Ok(Ok(Object::Array(names))) => names
                .iter()
                .filter_map(|n| n.as_name().ok().map(<[u8]>::to_vec))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn color_space(&self, obj: &Object, depth: usize) -> Result<ColorSpace> {
        if depth > 4 {
            return Err(Error::ImageExtract("color space nesting too deep".into()));
        }

        let unsupported = |name: &[u8]| {
            Error::ImageExtract(format!(
                "unsupported color space {}",
                String::from_utf8_lossy(name)
            ))
        };

        match self.resolve(obj)? {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
                b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
                other => Err(unsupported(other)),
            },
            Object::Array(parts) => {
                let family = parts
                    .first()
                    .and_then(|p| p.as_name().ok())
                    .ok_or_else(|| Error::ImageExtract("malformed color space".into()))?;
                match family {
                    b"ICCBased" => {
                        let n = parts
                            .get(1)
                            .and_then(|s| self.resolve_dict(s))
                            .and_then(|d| d.get(b"N").ok())
                            .and_then(get_number)
                            .unwrap_or(3.0);
                        ColorSpace::from_components(n as usize)
                            .ok_or_else(|| unsupported(b"ICCBased"))
                    }
                    b"CalGray" => Ok(ColorSpace::Gray),
                    b"CalRGB" => Ok(ColorSpace::Rgb),
                    b"Indexed" | b"I" => {
                        let base = parts
                            .get(1)
                            .ok_or_else(|| Error::ImageExtract("Indexed without base".into()))?;
                        let base = self.color_space(base, depth + 1)?;
                        let lookup = match parts.get(3).map(|l| self.resolve(l)) {
                            Some(Ok(Object::String(bytes, _))) => bytes.clone(),
                            Some(Ok(Object::Stream(stream))) => stream_bytes(stream)?,
                            _ => {
                                return Err(Error::ImageExtract(
                                    "Indexed without lookup table".into(),
                                ))
                            }
                        };
                        Ok(ColorSpace::Indexed {
                            base: Box::new(base),
                            lookup,
                        })
                    }
                    other => Err(unsupported(other)),
                }
            }
            _ => Err(Error::ImageExtract("malformed color space".into())),
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        self.page_id(index)?;
        let page_num = (index + 1) as u32;
        self.doc
            .extract_text(&[page_num])
            .map_err(|e| Error::TextExtract(format!("page {}: {}", page_num, e)))
    }

    fn page_images(&self, index: usize) -> Result<Vec<ImagePlacement>> {
        Ok(self
            .placements(index)?
            .into_iter()
            .map(|p| p.placement)
            .collect())
    }

    fn render_region(
        &self,
        index: usize,
        region: &BoundingBox,
        resolution: u32,
    ) -> Result<RgbImage> {
        let mut canvas = raster::blank_canvas(region, resolution)?;
        let mut decoded: HashMap<ObjectId, RgbImage> = HashMap::new();

        for placed in self.placements(index)? {
            if !placed.placement.bbox.intersects(region) {
                continue;
            }
            if !decoded.contains_key(&placed.object_id) {
                let img = self.decode_image(placed.object_id)?;
                decoded.insert(placed.object_id, img);
            }
            if let Some(src) = decoded.get(&placed.object_id) {
                raster::paint(
                    &mut canvas,
                    region,
                    resolution,
                    &placed.placement.bbox,
                    placed.flip,
                    src,
                );
            }
        }

        Ok(canvas)
    }

    fn info(&self) -> DocumentInfo {
        let mut info = DocumentInfo {
            pdf_version: Some(self.doc.version.to_string()),
            page_count: self.pages.len(),
            ..Default::default()
        };

        let dict = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| self.resolve_dict(obj));

        if let Some(dict) = dict {
            info.title = get_string_from_dict(dict, b"Title");
            info.author = get_string_from_dict(dict, b"Author");
            info.subject = get_string_from_dict(dict, b"Subject");
            info.creator = get_string_from_dict(dict, b"Creator");
            info.producer = get_string_from_dict(dict, b"Producer");
        }

        info
    }
}

/// Stream payload with filters applied.
fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .ok()
        .and_then(get_number)
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .ok_or_else(|| {
            Error::ImageExtract(format!(
                "image has no valid /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

/// Helper to extract a number from a PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Helper to get a text string from a PDF dictionary.
///
/// Strings with a UTF-16BE byte order mark are decoded as UTF-16; anything
/// else is tried as UTF-8 and falls back to Latin-1.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = match dict.get(key).ok()? {
        Object::String(bytes, _) => bytes,
        _ => return None,
    };

    let text = if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    };

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    #[test]
    fn test_get_number() {
        assert_eq!(get_number(&Object::Integer(42)), Some(42.0));
        assert_eq!(get_number(&Object::Real(1.5)), Some(1.5));
        assert_eq!(get_number(&Object::Null), None);
    }

    #[test]
    fn test_get_string_from_dict() {
        let mut dict = Dictionary::new();
        dict.set(
            "Title",
            Object::String(b"Quarterly Report".to_vec(), StringFormat::Literal),
        );
        dict.set(
            "Author",
            Object::String(
                vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69],
                StringFormat::Hexadecimal,
            ),
        );
        dict.set(
            "Subject",
            Object::String(vec![0x43, 0x61, 0x66, 0xE9], StringFormat::Literal),
        );
        dict.set("Creator", Object::String(b"   ".to_vec(), StringFormat::Literal));

        assert_eq!(
            get_string_from_dict(&dict, b"Title").as_deref(),
            Some("Quarterly Report")
        );
        assert_eq!(get_string_from_dict(&dict, b"Author").as_deref(), Some("Hi"));
        assert_eq!(get_string_from_dict(&dict, b"Subject").as_deref(), Some("Café"));
        assert_eq!(get_string_from_dict(&dict, b"Creator"), None);
        assert_eq!(get_string_from_dict(&dict, b"Missing"), None);
    }

    #[test]
    fn test_dict_u32() {
        let mut dict = Dictionary::new();
        dict.set("Width", Object::Integer(640));
        dict.set("Height", Object::Integer(0));
        assert_eq!(dict_u32(&dict, b"Width").unwrap(), 640);
        assert!(dict_u32(&dict, b"Height").is_err());
        assert!(dict_u32(&dict, b"Depth").is_err());
    }

    #[test]
    fn test_stream_bytes_unfiltered() {
        let stream = Stream::new(Dictionary::new(), b"BT ET".to_vec());
        assert_eq!(stream_bytes(&stream).unwrap(), b"BT ET");
    }

    #[test]
    fn test_load_bytes_rejects_non_pdf() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"GIF89a not a pdf"),
            Err(Error::UnknownFormat)
        ));
    }
}
