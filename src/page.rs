//! Fixed-size page layout: the binary format shared by the B-tree and
//! the virtual disk. All multi-byte integers are big-endian (spec §3);
//! access is through explicit offset reads/writes over a borrowed
//! slice, never a cursor with hidden iteration state.

use byteorder::{BigEndian, ByteOrder};

/// Page size in bytes. Every page, cached or on disk, is exactly this size.
pub const PAGE_SIZE: usize = 4096;

/// Size of the fixed page header: `node_type(1) | num_cells(2) | parent_ptr(4)`.
pub const HEADER_SIZE: usize = 7;

/// A page identifier. `0` is the null / "no parent" sentinel; real pages
/// start at `1`.
pub type PageId = u32;

/// Sentinel meaning "no page" / "this is the root".
pub const NULL_PAGE: PageId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

impl NodeType {
    fn from_byte(b: u8) -> NodeType {
        match b {
            1 => NodeType::Leaf,
            _ => NodeType::Internal,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            NodeType::Internal => 0,
            NodeType::Leaf => 1,
        }
    }
}

/// One fixed-size page buffer. Cheap to clone (a plain byte copy) since
/// the virtual disk hands out owned snapshots rather than references
/// into its cache.
#[derive(Clone, PartialEq, Eq)]
pub struct Page(Box<[u8; PAGE_SIZE]>);

impl Page {
    /// A fresh, all-zero page. The B-tree treats this as an
    /// uninitialized empty leaf until a header is written.
    pub fn zeroed() -> Page {
        Page(Box::new([0u8; PAGE_SIZE]))
    }

    pub fn from_bytes(bytes: [u8; PAGE_SIZE]) -> Page {
        Page(Box::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.0
    }

    /// True if the header region is untouched (node_type, num_cells and
    /// parent_ptr all zero) — spec §3's "uninitialized leaf" state.
    pub fn header_is_zeroed(&self) -> bool {
        self.0[0..HEADER_SIZE].iter().all(|&b| b == 0)
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_byte(self.0[0])
    }

    pub fn set_node_type(&mut self, kind: NodeType) {
        self.0[0] = kind.as_byte();
    }

    pub fn num_cells(&self) -> u16 {
        BigEndian::read_u16(&self.0[1..3])
    }

    pub fn set_num_cells(&mut self, n: u16) {
        BigEndian::write_u16(&mut self.0[1..3], n);
    }

    pub fn parent_ptr(&self) -> PageId {
        BigEndian::read_u32(&self.0[3..7])
    }

    pub fn set_parent_ptr(&mut self, parent: PageId) {
        BigEndian::write_u32(&mut self.0[3..7], parent);
    }

    /// Writes a fresh, properly-initialized empty leaf header in place.
    pub fn init_empty_leaf(&mut self) {
        self.set_node_type(NodeType::Leaf);
        self.set_num_cells(0);
        self.set_parent_ptr(NULL_PAGE);
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        BigEndian::read_u32(&self.0[offset..offset + 4])
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        BigEndian::write_u32(&mut self.0[offset..offset + 4], value);
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.0[offset..offset + len]
    }

    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        self.0[offset..offset + data.len()].copy_from_slice(data);
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("node_type", &self.node_type())
            .field("num_cells", &self.num_cells())
            .field("parent_ptr", &self.parent_ptr())
            .finish()
    }
}
