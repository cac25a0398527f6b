//! 3MF serialisation and OPC packaging
//!
//! An [`Assembly`] becomes one [`Model`] with a single `basematerials` group
//! listing the five filament slots, one mesh object per part (tagged with
//! `pid`/`pindex = slot`), and one assembly object whose components are the
//! parts. The build holds exactly one item, so slicers import the sandwich as
//! a single object with multiple parts.
//!
//! The package is assembled in memory; nothing touches the filesystem here.

use std::io::{Cursor, Seek, Write as IoWrite};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::filament::FilamentSet;
use crate::model::{
    BaseMaterial, BaseMaterialGroup, BuildItem, Component, Mesh, MetadataEntry, Model, Object,
};
use crate::sandwich::Assembly;

/// Main model part inside the archive
pub const MODEL_PATH: &str = "3D/3dmodel.model";

/// Content types part
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Package relationships part
pub const RELS_PATH: &str = "_rels/.rels";

/// Per-part extruder assignments read by slicers
pub const MODEL_SETTINGS_PATH: &str = "Metadata/model_settings.config";

/// Resource ID of the slot material group
pub const MATERIAL_GROUP_ID: usize = 1;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
  <Default Extension="config" ContentType="application/xml"/>
</Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Convert an assembly into a 3MF model
///
/// Part objects get IDs `2..`, in assembly order; the assembly object comes
/// last so every component references an earlier object.
pub fn build_model(assembly: &Assembly, filaments: &FilamentSet) -> Model {
    let mut model = Model::new();
    model.metadata.push(MetadataEntry::new(
        "Application",
        concat!("lumina3mf ", env!("CARGO_PKG_VERSION")),
    ));
    model
        .metadata
        .push(MetadataEntry::new("Title", "Layered pixel art"));

    let mut slots = BaseMaterialGroup::new(MATERIAL_GROUP_ID);
    for profile in filaments.iter() {
        let [r, g, b] = profile.color.to_bytes();
        slots
            .materials
            .push(BaseMaterial::new(profile.channel.name(), (r, g, b, 255)));
    }
    model.resources.base_material_groups.push(slots);

    let first_id = MATERIAL_GROUP_ID + 1;
    let mut components = Vec::with_capacity(assembly.parts.len());
    for (i, part) in assembly.parts.iter().enumerate() {
        let id = first_id + i;
        model.resources.objects.push(
            Object::with_mesh(id, part.name.as_str(), part.mesh.clone())
                .with_material(MATERIAL_GROUP_ID, part.slot()),
        );
        components.push(Component::new(id));
    }

    let assembly_id = first_id + assembly.parts.len();
    let mut root = Object::new(assembly_id);
    root.name = Some("Sandwich".to_string());
    root.components = components;
    model.resources.objects.push(root);
    model.build.items.push(BuildItem::new(assembly_id));

    model
}

/// Serialise a model as 3MF model XML
pub fn write_model_xml<W: IoWrite>(model: &Model, writer: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

    let mut model_elem = BytesStart::new("model");
    model_elem.push_attribute(("unit", model.unit.as_str()));
    model_elem.push_attribute(("xml:lang", "en-US"));
    model_elem.push_attribute(("xmlns", model.xmlns.as_str()));
    writer
        .write_event(Event::Start(model_elem))
        .map_err(|e| Error::xml_write(format!("Failed to write model element: {}", e)))?;

    for entry in &model.metadata {
        write_metadata(&mut writer, entry)?;
    }

    write_resources(&mut writer, model)?;
    write_build(&mut writer, model)?;

    writer
        .write_event(Event::End(BytesEnd::new("model")))
        .map_err(|e| Error::xml_write(format!("Failed to close model element: {}", e)))?;

    Ok(())
}

fn write_metadata<W: IoWrite>(writer: &mut Writer<W>, entry: &MetadataEntry) -> Result<()> {
    let mut elem = BytesStart::new("metadata");
    elem.push_attribute(("name", entry.name.as_str()));
    if let Some(preserve) = entry.preserve {
        elem.push_attribute(("preserve", if preserve { "1" } else { "0" }));
    }

    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write metadata element: {}", e)))?;
    writer
        .write_event(Event::Text(BytesText::new(&entry.value)))
        .map_err(|e| Error::xml_write(format!("Failed to write metadata value: {}", e)))?;
    writer
        .write_event(Event::End(BytesEnd::new("metadata")))
        .map_err(|e| Error::xml_write(format!("Failed to close metadata element: {}", e)))?;

    Ok(())
}

fn write_resources<W: IoWrite>(writer: &mut Writer<W>, model: &Model) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("resources")))
        .map_err(|e| Error::xml_write(format!("Failed to write resources element: {}", e)))?;

    for group in &model.resources.base_material_groups {
        write_base_material_group(writer, group)?;
    }
    for object in &model.resources.objects {
        write_object(writer, object)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("resources")))
        .map_err(|e| Error::xml_write(format!("Failed to close resources element: {}", e)))?;

    Ok(())
}

fn write_base_material_group<W: IoWrite>(
    writer: &mut Writer<W>,
    group: &BaseMaterialGroup,
) -> Result<()> {
    let mut elem = BytesStart::new("basematerials");
    elem.push_attribute(("id", group.id.to_string().as_str()));
    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write basematerials element: {}", e)))?;

    for material in &group.materials {
        let mut base = BytesStart::new("base");
        base.push_attribute(("name", material.name.as_str()));
        base.push_attribute(("displaycolor", material.displaycolor_hex().as_str()));
        writer
            .write_event(Event::Empty(base))
            .map_err(|e| Error::xml_write(format!("Failed to write base material: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("basematerials")))
        .map_err(|e| Error::xml_write(format!("Failed to close basematerials element: {}", e)))?;

    Ok(())
}

fn write_object<W: IoWrite>(writer: &mut Writer<W>, object: &Object) -> Result<()> {
    let mut elem = BytesStart::new("object");
    elem.push_attribute(("id", object.id.to_string().as_str()));
    elem.push_attribute(("type", object.object_type.as_str()));
    if let Some(ref name) = object.name {
        elem.push_attribute(("name", name.as_str()));
    }
    if let Some(pid) = object.pid {
        elem.push_attribute(("pid", pid.to_string().as_str()));
    }
    if let Some(pindex) = object.pindex {
        elem.push_attribute(("pindex", pindex.to_string().as_str()));
    }

    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write object element: {}", e)))?;

    if let Some(ref mesh) = object.mesh {
        write_mesh(writer, mesh)?;
    }
    if !object.components.is_empty() {
        write_components(writer, &object.components)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(|e| Error::xml_write(format!("Failed to close object element: {}", e)))?;

    Ok(())
}

fn write_mesh<W: IoWrite>(writer: &mut Writer<W>, mesh: &Mesh) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("mesh")))
        .map_err(|e| Error::xml_write(format!("Failed to write mesh element: {}", e)))?;

    // Empty slots still get both containers so the mesh stays well-formed.
    writer
        .write_event(Event::Start(BytesStart::new("vertices")))
        .map_err(|e| Error::xml_write(format!("Failed to write vertices element: {}", e)))?;
    for vertex in &mesh.vertices {
        let mut v_elem = BytesStart::new("vertex");
        v_elem.push_attribute(("x", vertex.x.to_string().as_str()));
        v_elem.push_attribute(("y", vertex.y.to_string().as_str()));
        v_elem.push_attribute(("z", vertex.z.to_string().as_str()));
        writer
            .write_event(Event::Empty(v_elem))
            .map_err(|e| Error::xml_write(format!("Failed to write vertex: {}", e)))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("vertices")))
        .map_err(|e| Error::xml_write(format!("Failed to close vertices element: {}", e)))?;

    writer
        .write_event(Event::Start(BytesStart::new("triangles")))
        .map_err(|e| Error::xml_write(format!("Failed to write triangles element: {}", e)))?;
    for triangle in &mesh.triangles {
        let mut t_elem = BytesStart::new("triangle");
        t_elem.push_attribute(("v1", triangle.v1.to_string().as_str()));
        t_elem.push_attribute(("v2", triangle.v2.to_string().as_str()));
        t_elem.push_attribute(("v3", triangle.v3.to_string().as_str()));
        writer
            .write_event(Event::Empty(t_elem))
            .map_err(|e| Error::xml_write(format!("Failed to write triangle: {}", e)))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("triangles")))
        .map_err(|e| Error::xml_write(format!("Failed to close triangles element: {}", e)))?;

    writer
        .write_event(Event::End(BytesEnd::new("mesh")))
        .map_err(|e| Error::xml_write(format!("Failed to close mesh element: {}", e)))?;

    Ok(())
}

fn write_components<W: IoWrite>(writer: &mut Writer<W>, components: &[Component]) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("components")))
        .map_err(|e| Error::xml_write(format!("Failed to write components element: {}", e)))?;

    for component in components {
        let mut elem = BytesStart::new("component");
        elem.push_attribute(("objectid", component.objectid.to_string().as_str()));
        if let Some(transform) = component.transform {
            elem.push_attribute(("transform", format_transform(&transform).as_str()));
        }
        writer
            .write_event(Event::Empty(elem))
            .map_err(|e| Error::xml_write(format!("Failed to write component: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("components")))
        .map_err(|e| Error::xml_write(format!("Failed to close components element: {}", e)))?;

    Ok(())
}

fn write_build<W: IoWrite>(writer: &mut Writer<W>, model: &Model) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("build")))
        .map_err(|e| Error::xml_write(format!("Failed to write build element: {}", e)))?;

    for item in &model.build.items {
        let mut elem = BytesStart::new("item");
        elem.push_attribute(("objectid", item.objectid.to_string().as_str()));
        if let Some(transform) = item.transform {
            elem.push_attribute(("transform", format_transform(&transform).as_str()));
        }
        writer
            .write_event(Event::Empty(elem))
            .map_err(|e| Error::xml_write(format!("Failed to write build item: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("build")))
        .map_err(|e| Error::xml_write(format!("Failed to close build element: {}", e)))?;

    Ok(())
}

fn format_transform(transform: &[f64; 12]) -> String {
    transform
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serialise the per-part extruder table (`extruder = slot + 1`)
///
/// Every build item that is an assembly gets an `<object>` entry listing its
/// parts; parts without a material index fall back to extruder 1.
pub fn write_model_settings<W: IoWrite>(model: &Model, writer: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;
    writer
        .write_event(Event::Start(BytesStart::new("config")))
        .map_err(|e| Error::xml_write(format!("Failed to write config element: {}", e)))?;

    for item in &model.build.items {
        let Some(root) = model.object(item.objectid) else {
            continue;
        };
        let mut object_elem = BytesStart::new("object");
        object_elem.push_attribute(("id", root.id.to_string().as_str()));
        writer
            .write_event(Event::Start(object_elem))
            .map_err(|e| Error::xml_write(format!("Failed to write settings object: {}", e)))?;

        write_setting(&mut writer, "name", root.name.as_deref().unwrap_or_default())?;
        write_setting(&mut writer, "extruder", "1")?;

        for part in model.parts_of(root.id) {
            let mut part_elem = BytesStart::new("part");
            part_elem.push_attribute(("id", part.id.to_string().as_str()));
            part_elem.push_attribute(("subtype", "normal_part"));
            writer
                .write_event(Event::Start(part_elem))
                .map_err(|e| Error::xml_write(format!("Failed to write settings part: {}", e)))?;

            let extruder = part.pindex.unwrap_or(0) + 1;
            write_setting(&mut writer, "name", part.name.as_deref().unwrap_or_default())?;
            write_setting(&mut writer, "extruder", &extruder.to_string())?;

            writer
                .write_event(Event::End(BytesEnd::new("part")))
                .map_err(|e| Error::xml_write(format!("Failed to close settings part: {}", e)))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("object")))
            .map_err(|e| Error::xml_write(format!("Failed to close settings object: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("config")))
        .map_err(|e| Error::xml_write(format!("Failed to close config element: {}", e)))?;

    Ok(())
}

fn write_setting<W: IoWrite>(writer: &mut Writer<W>, key: &str, value: &str) -> Result<()> {
    let mut elem = BytesStart::new("metadata");
    elem.push_attribute(("key", key));
    elem.push_attribute(("value", value));
    writer
        .write_event(Event::Empty(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write setting '{}': {}", key, e)))?;
    Ok(())
}

/// Write a complete 3MF package to a seekable writer
///
/// The archive contains `[Content_Types].xml`, `_rels/.rels`,
/// `3D/3dmodel.model` and `Metadata/model_settings.config`.
pub fn write_package<W: IoWrite + Seek>(model: &Model, writer: W) -> Result<W> {
    let mut model_xml = Vec::new();
    write_model_xml(model, &mut model_xml)?;
    let mut settings = Vec::new();
    write_model_settings(model, &mut settings)?;

    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    for (path, data) in [
        (CONTENT_TYPES_PATH, CONTENT_TYPES.as_bytes()),
        (RELS_PATH, RELS.as_bytes()),
        (MODEL_PATH, model_xml.as_slice()),
        (MODEL_SETTINGS_PATH, settings.as_slice()),
    ] {
        zip.start_file(path, options)
            .map_err(|e| Error::xml_write(format!("Failed to create {}: {}", path, e)))?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?)
}

/// Write a complete 3MF package into memory
pub fn package_bytes(model: &Model) -> Result<Vec<u8>> {
    Ok(write_package(model, Cursor::new(Vec::new()))?.into_inner())
}
