//! Reading 3MF packages back into [`Model`]
//!
//! Only the subset of the core specification produced by this crate is
//! understood: metadata, `basematerials`, mesh and component objects, and
//! build items. Unknown elements are skipped. Used by the `inspect` command
//! and by round-trip tests.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::model::{
    BaseMaterial, BaseMaterialGroup, BuildItem, Component, Mesh, MetadataEntry, Model, Object,
    ObjectType, Triangle, Vertex, parse_displaycolor,
};
use crate::writer::{CONTENT_TYPES_PATH, MODEL_PATH, MODEL_SETTINGS_PATH, RELS_PATH};

/// A 3MF package read from an archive
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Parsed model part
    pub model: Model,
    /// Extruder per part object ID, from the slicer settings part if present
    pub extruders: BTreeMap<usize, usize>,
}

impl Package {
    /// Read and parse a package
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFile`] when a required part is absent, or a
    /// parse error when the model XML is malformed.
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        for required in [CONTENT_TYPES_PATH, RELS_PATH, MODEL_PATH] {
            if archive.index_for_name(required).is_none() {
                return Err(Error::MissingFile(required.to_string()));
            }
        }

        let model = parse_model_xml(&read_part(&mut archive, MODEL_PATH)?)?;
        let extruders = if archive.index_for_name(MODEL_SETTINGS_PATH).is_some() {
            parse_model_settings(&read_part(&mut archive, MODEL_SETTINGS_PATH)?)?
        } else {
            BTreeMap::new()
        };

        Ok(Self { model, extruders })
    }
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::MissingFile(name.to_string()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Parse 3MF model XML
pub fn parse_model_xml(xml: &str) -> Result<Model> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut model = Model::new();
    let mut in_resources = false;
    let mut in_build = false;
    let mut current_object: Option<Object> = None;
    let mut current_group: Option<BaseMaterialGroup> = None;
    let mut current_metadata: Option<MetadataEntry> = None;

    loop {
        match reader.read_event()? {
            Event::Empty(ref e) if !in_resources && e.local_name().as_ref() == b"metadata" => {
                model.metadata.push(parse_metadata(e)?);
            }
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"model" => {
                    let attrs = parse_attributes(e)?;
                    if let Some(unit) = attrs.get("unit") {
                        model.unit = unit.clone();
                    }
                    if let Some(xmlns) = attrs.get("xmlns") {
                        model.xmlns = xmlns.clone();
                    }
                }
                b"metadata" if !in_resources => current_metadata = Some(parse_metadata(e)?),
                b"resources" => in_resources = true,
                b"build" => in_build = true,
                b"basematerials" if in_resources => {
                    let attrs = parse_attributes(e)?;
                    let id = required(&attrs, "basematerials", "id")?.parse::<usize>()?;
                    current_group = Some(BaseMaterialGroup::new(id));
                }
                b"base" => {
                    if let Some(ref mut group) = current_group {
                        group.materials.push(parse_base(e)?);
                    }
                }
                b"object" if in_resources => current_object = Some(parse_object(e)?),
                b"mesh" => {
                    if let Some(ref mut object) = current_object {
                        object.mesh = Some(Mesh::new());
                    }
                }
                b"vertex" => {
                    if let Some(mesh) = current_object.as_mut().and_then(|o| o.mesh.as_mut()) {
                        mesh.vertices.push(parse_vertex(e)?);
                    }
                }
                b"triangle" => {
                    if let Some(mesh) = current_object.as_mut().and_then(|o| o.mesh.as_mut()) {
                        mesh.triangles.push(parse_triangle(e)?);
                    }
                }
                b"component" => {
                    if let Some(ref mut object) = current_object {
                        object.components.push(parse_component(e)?);
                    }
                }
                b"item" if in_build => model.build.items.push(parse_build_item(e)?),
                _ => {}
            },
            Event::Text(t) => {
                if let Some(ref mut entry) = current_metadata {
                    let text =
                        std::str::from_utf8(&t).map_err(|e| Error::InvalidFormat(e.to_string()))?;
                    entry.value.push_str(text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"metadata" => {
                    if let Some(entry) = current_metadata.take() {
                        model.metadata.push(entry);
                    }
                }
                b"resources" => in_resources = false,
                b"build" => in_build = false,
                b"basematerials" => {
                    if let Some(group) = current_group.take() {
                        model.resources.base_material_groups.push(group);
                    }
                }
                b"object" => {
                    if let Some(object) = current_object.take() {
                        model.resources.objects.push(object);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(model)
}

/// Parse the slicer settings part into a map of part ID to extruder
pub fn parse_model_settings(xml: &str) -> Result<BTreeMap<usize, usize>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut extruders = BTreeMap::new();
    let mut current_part: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"part" => {
                    let attrs = parse_attributes(e)?;
                    current_part = Some(required(&attrs, "part", "id")?.parse()?);
                }
                b"metadata" => {
                    let attrs = parse_attributes(e)?;
                    if let (Some(part), Some("extruder")) =
                        (current_part, attrs.get("key").map(String::as_str))
                    {
                        let value = required(&attrs, "metadata", "value")?;
                        extruders.insert(part, value.parse()?);
                    }
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"part" => current_part = None,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(extruders)
}

fn parse_attributes(e: &BytesStart) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::with_capacity(8);
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::InvalidFormat(e.to_string()))?;
        let raw =
            std::str::from_utf8(&attr.value).map_err(|e| Error::InvalidFormat(e.to_string()))?;
        let value = unescape(raw).map_err(|e| Error::XmlAttr(e.to_string()))?;
        attrs.insert(key.to_string(), value.into_owned());
    }
    Ok(attrs)
}

fn parse_metadata(e: &BytesStart) -> Result<MetadataEntry> {
    let attrs = parse_attributes(e)?;
    let mut entry = MetadataEntry::new(required(&attrs, "metadata", "name")?, "");
    entry.preserve = attrs.get("preserve").map(|p| p == "1" || p == "true");
    Ok(entry)
}

fn required<'a>(
    attrs: &'a HashMap<String, String>,
    element: &str,
    attribute: &str,
) -> Result<&'a str> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| Error::missing_attribute(element, attribute))
}

fn parse_base(e: &BytesStart) -> Result<BaseMaterial> {
    let attrs = parse_attributes(e)?;
    let name = required(&attrs, "base", "name")?;
    let color = required(&attrs, "base", "displaycolor")?;
    let displaycolor = parse_displaycolor(color)
        .ok_or_else(|| Error::ParseError(format!("Invalid display colour '{}'", color)))?;
    Ok(BaseMaterial::new(name, displaycolor))
}

fn parse_object(e: &BytesStart) -> Result<Object> {
    let attrs = parse_attributes(e)?;
    let id = required(&attrs, "object", "id")?.parse::<usize>()?;
    let mut object = Object::new(id);
    object.name = attrs.get("name").cloned();
    if let Some(kind) = attrs.get("type") {
        object.object_type = ObjectType::parse(kind);
    }
    if let Some(pid) = attrs.get("pid") {
        object.pid = Some(pid.parse()?);
    }
    if let Some(pindex) = attrs.get("pindex") {
        object.pindex = Some(pindex.parse()?);
    }
    Ok(object)
}

fn parse_vertex(e: &BytesStart) -> Result<Vertex> {
    let attrs = parse_attributes(e)?;
    let coord = |axis: &str| -> Result<f64> {
        let value: f64 = required(&attrs, "vertex", axis)?.parse()?;
        if !value.is_finite() {
            return Err(Error::InvalidFormat(format!(
                "Vertex {} coordinate must be finite (got {})",
                axis, value
            )));
        }
        Ok(value)
    };
    Ok(Vertex::new(coord("x")?, coord("y")?, coord("z")?))
}

fn parse_triangle(e: &BytesStart) -> Result<Triangle> {
    let attrs = parse_attributes(e)?;
    let index = |name: &str| -> Result<usize> { Ok(required(&attrs, "triangle", name)?.parse()?) };
    Ok(Triangle::new(index("v1")?, index("v2")?, index("v3")?))
}

fn parse_transform(value: &str) -> Result<[f64; 12]> {
    let values = value
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values.try_into().map_err(|v: Vec<f64>| {
        Error::InvalidFormat(format!(
            "Transform must have 12 values, found {}",
            v.len()
        ))
    })
}

fn parse_component(e: &BytesStart) -> Result<Component> {
    let attrs = parse_attributes(e)?;
    let objectid = required(&attrs, "component", "objectid")?.parse()?;
    Ok(match attrs.get("transform") {
        Some(t) => Component::with_transform(objectid, parse_transform(t)?),
        None => Component::new(objectid),
    })
}

fn parse_build_item(e: &BytesStart) -> Result<BuildItem> {
    let attrs = parse_attributes(e)?;
    let mut item = BuildItem::new(required(&attrs, "item", "objectid")?.parse()?);
    if let Some(t) = attrs.get("transform") {
        item.transform = Some(parse_transform(t)?);
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <metadata name="Title">Layered pixel art</metadata>
  <resources>
    <basematerials id="1">
      <base name="White" displaycolor="#FFFFFFFF"/>
      <base name="Cyan" displaycolor="#0086D6"/>
    </basematerials>
    <object id="2" type="model" name="Cyan (face-up)" pid="1" pindex="1">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="1.5" y="0" z="0"/>
          <vertex x="0" y="1" z="0.25"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
        </triangles>
      </mesh>
    </object>
    <object id="3" type="model" name="Sandwich">
      <components>
        <component objectid="2" transform="1 0 0 0 1 0 0 0 1 5 0 0"/>
      </components>
    </object>
  </resources>
  <build>
    <item objectid="3"/>
  </build>
</model>"##;

    #[test]
    fn test_parse_model_xml() {
        let model = parse_model_xml(MODEL).unwrap();
        assert_eq!(model.unit, "millimeter");
        assert_eq!(model.get_metadata("Title"), Some("Layered pixel art"));

        let group = &model.resources.base_material_groups[0];
        assert_eq!(group.id, 1);
        assert_eq!(group.materials[1].displaycolor, (0x00, 0x86, 0xD6, 0xFF));

        let part = model.object(2).unwrap();
        assert_eq!(part.pindex, Some(1));
        let mesh = part.mesh.as_ref().unwrap();
        assert_eq!(mesh.vertices[2], Vertex::new(0.0, 1.0, 0.25));
        assert_eq!(mesh.triangles, vec![Triangle::new(0, 1, 2)]);

        let root = model.object(3).unwrap();
        assert!(root.mesh.is_none());
        assert_eq!(root.components[0].transform.unwrap()[9], 5.0);
        assert_eq!(model.build.items, vec![BuildItem::new(3)]);
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let xml = r#"<model><resources><object id="1"><mesh><vertices>
            <vertex x="0" y="0"/></vertices></mesh></object></resources></model>"#;
        let err = parse_model_xml(xml).unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_bad_number_is_parse_error() {
        let xml = r#"<model><resources><object id="one"/></resources></model>"#;
        assert!(matches!(
            parse_model_xml(xml).unwrap_err(),
            Error::ParseError(_)
        ));
    }

    #[test]
    fn test_parse_model_settings() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <object id="13">
    <metadata key="name" value="Sandwich"/>
    <metadata key="extruder" value="1"/>
    <part id="2" subtype="normal_part">
      <metadata key="name" value="Cyan (face-down)"/>
      <metadata key="extruder" value="2"/>
    </part>
    <part id="6" subtype="normal_part">
      <metadata key="extruder" value="5"/>
    </part>
  </object>
</config>"#;
        let extruders = parse_model_settings(xml).unwrap();
        assert_eq!(extruders.len(), 2);
        assert_eq!(extruders[&2], 2);
        assert_eq!(extruders[&6], 5);
    }

    #[test]
    fn test_not_a_zip() {
        let err = Package::read(std::io::Cursor::new(b"not a zip".to_vec())).unwrap_err();
        assert!(matches!(err, Error::Zip(_)));
    }
}
