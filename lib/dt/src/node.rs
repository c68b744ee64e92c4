use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, string::String, vec::Vec};
use core::ops::Range;
use utils::define_handle;

define_handle!(
    /// Handle of a node inside a [DeviceTree]. The index doubles as the node offset.
    NodeId
);

/// Default `#address-cells` when a bus node does not declare one.
pub const DEFAULT_ADDRESS_CELLS: u32 = 2;
/// Default `#size-cells` when a bus node does not declare one.
pub const DEFAULT_SIZE_CELLS: u32 = 1;

pub struct DeviceTree {
    pub root_id: NodeId,
    container: Vec<Node>,
}

pub struct Node {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    /// Name including the unit address, e.g. `serial@10000000`.
    pub full_name: Box<str>,
    /// Name without the unit address, e.g. `serial`.
    pub node_name: Box<str>,
    /// Text after `@`, empty if absent.
    pub unit_addr: Box<str>,
    pub children: Vec<NodeId>,
    pub props: Vec<Property>,
}

/// First entry of a `ranges`/`dma-ranges` property: a window of `size` bytes where bus address
/// `bus` is seen by the CPU (the parent address space) at `cpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub cpu: u64,
    pub bus: u64,
    pub size: u64,
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

// region: builder

impl DeviceTree {
    /// Create a tree holding only the root node `/`.
    pub fn new() -> DeviceTree {
        let root = Node {
            node_id: NodeId::from_index(0),
            parent_id: None,
            full_name: Box::from(""),
            node_name: Box::from(""),
            unit_addr: Box::from(""),
            children: Vec::new(),
            props: Vec::new(),
        };
        DeviceTree {
            root_id: root.node_id,
            container: alloc::vec![root],
        }
    }

    /// Append a child node named `full_name` (`name@unit`) under `parent`.
    pub fn add_node(&mut self, parent: NodeId, full_name: &str) -> NodeId {
        let node_id = NodeId::from_index(self.container.len());
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        self.container.push(Node {
            node_id,
            parent_id: Some(parent),
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children: Vec::new(),
            props: Vec::new(),
        });
        self.container[parent.index()].children.push(node_id);
        node_id
    }

    /// Set (or replace) a raw property value.
    pub fn set_property(&mut self, node: NodeId, name: &str, data: &[u8]) {
        let props = &mut self.container[node.index()].props;
        let prop = Property::new(name, data);
        match props.iter_mut().find(|p| p.name.as_ref() == name) {
            Some(existing) => *existing = prop,
            None => props.push(prop),
        }
    }

    /// Set a NUL-terminated string property.
    pub fn set_str(&mut self, node: NodeId, name: &str, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.set_property(node, name, &data);
    }

    /// Set a string-list property, each entry NUL-terminated.
    pub fn set_strlist(&mut self, node: NodeId, name: &str, values: &[&str]) {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.set_property(node, name, &data);
    }

    /// Set a property made of big-endian 32-bit cells.
    pub fn set_cells(&mut self, node: NodeId, name: &str, cells: &[u32]) {
        let data: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.set_property(node, name, &data);
    }
}

// endregion

impl DeviceTree {
    pub fn root(&self) -> NodeId {
        self.root_id
    }
    /// Whether `id` names a node of this tree.
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.container.len()
    }
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.container.get(id.index())
    }
    pub fn node_count(&self) -> usize {
        self.container.len()
    }
    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root_id
    }
    pub fn get_parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent_id
    }
    pub fn get_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }
    pub fn get_property(&self, id: NodeId, name: impl AsRef<str>) -> Option<&Property> {
        let name = name.as_ref();
        self.node(id)?
            .props
            .iter()
            .find(|prop| prop.name.as_ref() == name)
    }
    fn full_path(&self, id: NodeId) -> String {
        match self.node(id) {
            Some(node) => match node.parent_id {
                Some(parent) => self.full_path(parent) + "/" + node.full_name.as_ref(),
                None => String::new(),
            },
            None => String::new(),
        }
    }
    pub fn get_full_path(&self, id: NodeId) -> Box<str> {
        let path = self.full_path(id);
        if path.is_empty() {
            return Box::from("/");
        }
        path.into_boxed_str()
    }
    /// Resolve an absolute path such as `/soc/serial@1000`.
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<NodeId> {
        let mut node = self.root_id;
        for section in path.as_ref().split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|child| self.container[child.index()].full_name.as_ref() == section)?;
        }
        Some(node)
    }
}

// region: standard properties

impl DeviceTree {
    /// The node's `compatible` strings in priority order; empty if absent or malformed.
    pub fn compatible(&self, id: NodeId) -> Vec<&str> {
        self.get_property(id, "compatible")
            .and_then(|prop| prop.value_as_strlist().ok())
            .unwrap_or_default()
    }

    /// A node is enabled unless its `status` says otherwise.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        match self.get_property(id, "status") {
            None => true,
            Some(prop) => matches!(prop.value_as_str(), Ok("okay") | Ok("ok")),
        }
    }

    /// Whether the node carries a (boolean) property.
    pub fn has_property(&self, id: NodeId, name: &str) -> bool {
        self.get_property(id, name).is_some()
    }

    fn cells_or(&self, id: NodeId, name: &str, default: u32) -> Result<u32, PropertyError> {
        match self.get_property(id, name) {
            Some(prop) => prop.value_as_u32(),
            None => Ok(default),
        }
    }

    /// `#address-cells` declared by `id` for its own children.
    pub fn address_cells(&self, id: NodeId) -> Result<u32, PropertyError> {
        self.cells_or(id, "#address-cells", DEFAULT_ADDRESS_CELLS)
    }

    /// `#size-cells` declared by `id` for its own children.
    pub fn size_cells(&self, id: NodeId) -> Result<u32, PropertyError> {
        self.cells_or(id, "#size-cells", DEFAULT_SIZE_CELLS)
    }

    /// Decode `reg` using the parent's cell widths.
    pub fn get_reg_value(&self, id: NodeId) -> Result<Vec<Range<u64>>, PropertyError> {
        let (addr_cel, size_cel) = match self.get_parent(id) {
            Some(parent) => (self.address_cells(parent)?, self.size_cells(parent)?),
            None => (DEFAULT_ADDRESS_CELLS, DEFAULT_SIZE_CELLS),
        };
        let reg = self
            .get_property(id, "reg")
            .ok_or(PropertyError::PropNotFound)?
            .value_as_cells()?;
        let width = (addr_cel + size_cel) as usize;
        if width == 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        let mut res = Vec::new();
        for entry in reg.chunks_exact(width) {
            let (addr, sz) = entry.split_at(addr_cel as usize);
            let start = read_number(addr);
            res.push(start..start + read_number(sz));
        }
        Ok(res)
    }
}

/// Fold big-endian cells into one number, keeping the low 64 bits.
fn read_number(cells: &[u32]) -> u64 {
    cells.iter().fold(0u64, |acc, c| (acc << 32) | *c as u64)
}

// endregion

// region: aliases

impl DeviceTree {
    /// Sequence number `n` of the `/aliases` entry `<stem><n>` that points at `id`.
    pub fn alias_seq(&self, stem: &str, id: NodeId) -> Option<u32> {
        self.aliases(stem)
            .find(|(_, target)| *target == Some(id))
            .map(|(seq, _)| seq)
    }

    /// Highest `n` among the `/aliases` entries `<stem><n>`, whether or not they resolve.
    pub fn alias_highest_id(&self, stem: &str) -> Option<u32> {
        self.aliases(stem).map(|(seq, _)| seq).max()
    }

    fn aliases<'a>(&'a self, stem: &'a str) -> impl Iterator<Item = (u32, Option<NodeId>)> + 'a {
        let props = self
            .get_node("/aliases")
            .and_then(|id| self.node(id))
            .map(|node| node.props.as_slice())
            .unwrap_or(&[]);
        props.iter().filter_map(move |prop| {
            let digits = prop.name.strip_prefix(stem)?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let seq = digits.parse::<u32>().ok()?;
            let target = prop.value_as_str().ok().and_then(|path| self.get_node(path));
            Some((seq, target))
        })
    }
}

// endregion

// region: ranges and dma-ranges

impl DeviceTree {
    /// Find the closest `dma-ranges` at or above `id` and decode its first entry.
    ///
    /// Empty `dma-ranges` mean a 1:1 mapping at that level and the walk continues upwards; once one
    /// has been seen, an ancestor without `dma-ranges` breaks the chain and is reported as malformed.
    /// `Ok(None)` when no translation applies.
    pub fn dma_range(&self, id: NodeId) -> Result<Option<AddressWindow>, PropertyError> {
        let mut cursor = Some(id);
        let mut seen_empty = false;
        while let Some(node) = cursor {
            match self.get_property(node, "dma-ranges") {
                Some(prop) if !prop.is_empty() => return self.decode_window(node, prop).map(Some),
                Some(_) => seen_empty = true,
                None if seen_empty => return Err(PropertyError::InvalidPropFormat),
                None => {}
            }
            cursor = self.get_parent(node);
        }
        Ok(None)
    }

    /// Decode the first entry of the node's own `ranges`. Absent or empty `ranges` mean no window
    /// (an identity mapping) and yield `Ok(None)`.
    pub fn ranges(&self, id: NodeId) -> Result<Option<AddressWindow>, PropertyError> {
        match self.get_property(id, "ranges") {
            Some(prop) if !prop.is_empty() => self.decode_window(id, prop).map(Some),
            _ => Ok(None),
        }
    }

    /// Entries are `<child-address parent-address size>` sized by the node's own cells and its
    /// parent's `#address-cells`.
    fn decode_window(&self, node: NodeId, prop: &Property) -> Result<AddressWindow, PropertyError> {
        let parent = self.get_parent(node).ok_or(PropertyError::InvalidPropFormat)?;
        let na = self.address_cells(node)? as usize;
        let ns = self.size_cells(node)? as usize;
        let pna = self.address_cells(parent)? as usize;
        let cells = prop.value_as_cells()?;
        if cells.len() < na + pna + ns {
            return Err(PropertyError::InvalidPropFormat);
        }
        Ok(AddressWindow {
            bus: read_number(&cells[..na]),
            cpu: read_number(&cells[na..na + pna]),
            size: read_number(&cells[na + pna..na + pna + ns]),
        })
    }
}

// endregion
