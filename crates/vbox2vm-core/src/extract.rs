//! Field extraction from a VirtualBox OVF descriptor.
//!
//! [`Ovf`] exposes one lookup per field group. Each lookup returns a small
//! [`RenderContext`] and fails with [`Error::MissingElement`] as soon as an
//! element or attribute it needs is absent, so a partially filled context is
//! never produced.

use tracing::debug;

use crate::context::{Overrides, RenderContext};
use crate::document::{Document, Element};
use crate::error::{Error, Result};

/// Caption substring identifying the virtual CPU hardware item.
pub const CPU_CAPTION: &str = "CPU";

/// Caption substring identifying the memory hardware item.
pub const MEMORY_CAPTION: &str = "MB";

/// Read-only view over a parsed descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Ovf<'a> {
    doc: &'a Document,
}

impl<'a> Ovf<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// The `ovf:href` and `ovf:id` of the referenced disk file.
    pub fn references(&self) -> Result<RenderContext> {
        let references = self.section("references")?;
        let file = child(references, "references", "file")?;

        Ok(RenderContext::new()
            .with("file_href", attr(file, "references/file", "ovf:href")?)
            .with("file_id", attr(file, "references/file", "ovf:id")?))
    }

    /// Geometry and identity of the first disk in the `DiskSection`.
    pub fn disk(&self) -> Result<RenderContext> {
        let section = self.section("disksection")?;
        let disk = child(section, "disksection", "disk")?;
        let path = "disksection/disk";

        Ok(RenderContext::new()
            .with("ovf_disk_capacity", attr(disk, path, "ovf:capacity")?)
            .with("ovf_disk_diskid", attr(disk, path, "ovf:diskid")?)
            .with("ovf_disk_fileref", attr(disk, path, "ovf:fileref")?)
            .with("ovf_disk_format", attr(disk, path, "ovf:format")?)
            .with("vbox_disk_uuid", attr(disk, path, "vbox:uuid")?))
    }

    /// Name of the first logical network.
    pub fn network(&self) -> Result<RenderContext> {
        let section = self.section("networksection")?;
        let network = child(section, "networksection", "network")?;

        Ok(RenderContext::new().with(
            "ovf_network_name",
            attr(network, "networksection/network", "ovf:name")?,
        ))
    }

    /// Identity and hardware family of the virtual system.
    ///
    /// The system id is published under both `virtual_system_id` and
    /// `virtual_system_identifier`.
    pub fn virtual_system(&self) -> Result<RenderContext> {
        let virtual_system = self.section("virtualsystem")?;
        let hardware = child(virtual_system, "virtualsystem", "virtualhardwaresection")?;
        let system = child(hardware, "virtualhardwaresection", "system")?;
        let system_type = child(system, "system", "vssd:virtualsystemtype")?.text();
        let id = attr(virtual_system, "virtualsystem", "ovf:id")?;

        Ok(RenderContext::new()
            .with("virtual_system_id", id)
            .with("virtual_system_identifier", id)
            .with("virtual_system_type", system_type))
    }

    /// Guest OS id, description and VirtualBox OS type.
    pub fn operating_system(&self) -> Result<RenderContext> {
        let oss = self.section("operatingsystemsection")?;
        let description = child(oss, "operatingsystemsection", "description")?.text();
        let os_type = child(oss, "operatingsystemsection", "vbox:ostype")?.text();

        Ok(RenderContext::new()
            .with("oss_id", attr(oss, "operatingsystemsection", "ovf:id")?)
            .with("oss_description", description)
            .with("oss_type", os_type))
    }

    /// Number of virtual CPUs.
    pub fn cpus(&self) -> Result<RenderContext> {
        Ok(RenderContext::new().with("cpus", self.hardware_item(CPU_CAPTION)?))
    }

    /// Memory size in megabytes.
    pub fn memory(&self) -> Result<RenderContext> {
        Ok(RenderContext::new().with("memory", self.hardware_item(MEMORY_CAPTION)?))
    }

    /// Virtual quantity of the first hardware item whose caption contains
    /// `caption`.
    ///
    /// Matching is plain substring containment, so `"MB"` also matches a
    /// caption like `"USB controller (MB)"` if it comes first.
    fn hardware_item(&self, caption: &str) -> Result<i64> {
        let hardware = self.section("virtualhardwaresection")?;

        // TODO: decide whether several matching items (e.g. one per CPU
        // socket) should be summed instead of taking the first.
        let item = hardware
            .find_all("item")
            .into_iter()
            .find(|item| {
                item.find("rasd:caption")
                    .is_some_and(|c| c.text().contains(caption))
            })
            .ok_or_else(|| {
                Error::missing_element(format!(
                    "virtualhardwaresection/item with caption containing '{}'",
                    caption
                ))
            })?;

        let quantity = child(item, "item", "rasd:virtualquantity")?.text();
        quantity
            .parse::<i64>()
            .map_err(|_| Error::invalid_value("rasd:virtualquantity", quantity))
    }

    /// All field groups merged into one context.
    pub fn context(&self) -> Result<RenderContext> {
        let groups = [
            ("references", self.references()?),
            ("disk", self.disk()?),
            ("network", self.network()?),
            ("virtual_system", self.virtual_system()?),
            ("operating_system", self.operating_system()?),
            ("cpus", self.cpus()?),
            ("memory", self.memory()?),
        ];

        let mut context = RenderContext::new();
        for (group, values) in groups {
            debug!(group, ?values, "extracted field group");
            debug_assert!(
                values.keys().all(|key| !context.contains_key(key)),
                "field group '{}' reuses a key of an earlier group",
                group
            );
            context.extend(values);
        }
        Ok(context)
    }

    /// The extracted context with `overrides` applied.
    pub fn update(&self, overrides: &Overrides) -> Result<RenderContext> {
        Ok(self.context()?.updated(overrides))
    }

    fn section(&self, name: &str) -> Result<&'a Element> {
        self.doc
            .find(name)
            .ok_or_else(|| Error::missing_element(name))
    }
}

fn child<'e>(parent: &'e Element, parent_path: &str, name: &str) -> Result<&'e Element> {
    parent
        .find(name)
        .ok_or_else(|| Error::missing_element(format!("{}/{}", parent_path, name)))
}

fn attr<'e>(element: &'e Element, path: &str, name: &str) -> Result<&'e str> {
    element
        .attr(name)
        .ok_or_else(|| Error::missing_element(format!("{}[@{}]", path, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextValue;

    const HARDWARE: &str = r#"<Envelope>
  <VirtualHardwareSection>
    <Item>
      <rasd:Caption>ideController0</rasd:Caption>
      <rasd:VirtualQuantity>0</rasd:VirtualQuantity>
    </Item>
    <Item>
      <rasd:Caption>2 virtual CPU</rasd:Caption>
      <rasd:VirtualQuantity>2</rasd:VirtualQuantity>
    </Item>
    <Item>
      <rasd:Caption>4096 MB of memory</rasd:Caption>
      <rasd:VirtualQuantity>4096</rasd:VirtualQuantity>
    </Item>
    <Item>
      <rasd:Caption>another CPU</rasd:Caption>
      <rasd:VirtualQuantity>8</rasd:VirtualQuantity>
    </Item>
  </VirtualHardwareSection>
</Envelope>"#;

    #[test]
    fn test_hardware_item_first_match_wins() {
        let doc = Document::parse_str(HARDWARE).unwrap();
        let ovf = Ovf::new(&doc);
        assert_eq!(ovf.hardware_item("CPU").unwrap(), 2);
        assert_eq!(ovf.hardware_item("MB").unwrap(), 4096);
    }

    #[test]
    fn test_hardware_item_caption_match_is_case_sensitive() {
        let doc = Document::parse_str(HARDWARE).unwrap();
        let err = Ovf::new(&doc).hardware_item("cpu").unwrap_err();
        assert!(matches!(err, Error::MissingElement { .. }));
    }

    #[test]
    fn test_cpus_and_memory_are_integers() {
        let doc = Document::parse_str(HARDWARE).unwrap();
        let ovf = Ovf::new(&doc);
        assert_eq!(ovf.cpus().unwrap().get("cpus"), Some(&ContextValue::Integer(2)));
        assert_eq!(
            ovf.memory().unwrap().get("memory"),
            Some(&ContextValue::Integer(4096))
        );
    }

    #[test]
    fn test_hardware_item_non_numeric_quantity() {
        let doc = Document::parse_str(
            "<e><VirtualHardwareSection><Item><rasd:Caption>1 CPU</rasd:Caption>\
             <rasd:VirtualQuantity>one</rasd:VirtualQuantity></Item></VirtualHardwareSection></e>",
        )
        .unwrap();
        let err = Ovf::new(&doc).cpus().unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_attribute_names_path() {
        let doc = Document::parse_str(r#"<e><References><File ovf:id="file1"/></References></e>"#)
            .unwrap();
        let err = Ovf::new(&doc).references().unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing element: references/file[@ovf:href]"
        );
    }

    #[test]
    fn test_missing_section() {
        let doc = Document::parse_str("<Envelope/>").unwrap();
        let err = Ovf::new(&doc).network().unwrap_err();
        assert!(matches!(err, Error::MissingElement { ref element } if element == "networksection"));
    }
}
