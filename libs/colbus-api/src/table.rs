use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

// ════════════════════════════════════════════════════════════════
//  Names & descriptors
// ════════════════════════════════════════════════════════════════

/// Table name as the caller spelled it. The backend decides whether it is legal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace part of `ns:table`, `None` for the default namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(':').map(|(ns, _)| ns)
    }

    /// Qualifier part of `ns:table`, or the whole name.
    pub fn qualifier(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, q)| q)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TableName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamilyDescriptor {
    pub name: Bytes,
}

impl ColumnFamilyDescriptor {
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Self { name: Bytes::copy_from_slice(name.as_ref()) }
    }
}

/// Table definition handed to `Admin::create_table`.
///
/// Families are kept sorted by name; adding a name twice keeps one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: TableName,
    families: BTreeMap<Bytes, ColumnFamilyDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: TableName) -> Self {
        Self { name, families: BTreeMap::new() }
    }

    pub fn add_family(&mut self, family: ColumnFamilyDescriptor) -> &mut Self {
        self.families.insert(family.name.clone(), family);
        self
    }

    pub fn with_family(mut self, name: impl AsRef<[u8]>) -> Self {
        self.add_family(ColumnFamilyDescriptor::new(name));
        self
    }

    pub fn families(&self) -> impl Iterator<Item = &ColumnFamilyDescriptor> {
        self.families.values()
    }

    pub fn has_family(&self, name: &[u8]) -> bool {
        self.families.contains_key(name)
    }
}

// ════════════════════════════════════════════════════════════════
//  Cells & rows
// ════════════════════════════════════════════════════════════════

/// One stored value addressed by (row, family, qualifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub timestamp_ms: i64,
    pub value: Bytes,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row={} family={} qualifier={} value={}",
            String::from_utf8_lossy(&self.row),
            String::from_utf8_lossy(&self.family),
            String::from_utf8_lossy(&self.qualifier),
            String::from_utf8_lossy(&self.value),
        )
    }
}

/// Cells returned for one row, sorted by (family, qualifier).
///
/// An empty result means the row (or the requested families) holds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowResult {
    pub row: Bytes,
    pub cells: Vec<Cell>,
}

impl RowResult {
    pub fn empty(row: Bytes) -> Self {
        Self { row, cells: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&Bytes> {
        self.cells
            .iter()
            .find(|c| c.family.as_ref() == family && c.qualifier.as_ref() == qualifier)
            .map(|c| &c.value)
    }
}

// ════════════════════════════════════════════════════════════════
//  Mutations
// ════════════════════════════════════════════════════════════════

/// Upsert of one or more cells in a single row. Each cell fully replaces
/// whatever was stored under the same (family, qualifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    pub row: Bytes,
    pub columns: Vec<(Bytes, Bytes, Bytes)>,
}

impl Put {
    pub fn new(row: impl AsRef<[u8]>) -> Self {
        Self { row: Bytes::copy_from_slice(row.as_ref()), columns: Vec::new() }
    }

    pub fn add_column(
        mut self,
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Self {
        self.columns.push((
            Bytes::copy_from_slice(family.as_ref()),
            Bytes::copy_from_slice(qualifier.as_ref()),
            Bytes::copy_from_slice(value.as_ref()),
        ));
        self
    }
}

/// Row-scoped delete. With no families the whole row goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub row: Bytes,
    pub families: Vec<Bytes>,
}

impl Delete {
    pub fn new(row: impl AsRef<[u8]>) -> Self {
        Self { row: Bytes::copy_from_slice(row.as_ref()), families: Vec::new() }
    }

    pub fn add_family(mut self, family: impl AsRef<[u8]>) -> Self {
        self.families.push(Bytes::copy_from_slice(family.as_ref()));
        self
    }

    pub fn is_whole_row(&self) -> bool {
        self.families.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════
//  Reads
// ════════════════════════════════════════════════════════════════

/// Point lookup of one row, optionally restricted to some families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Get {
    pub row: Bytes,
    pub families: Vec<Bytes>,
}

impl Get {
    pub fn new(row: impl AsRef<[u8]>) -> Self {
        Self { row: Bytes::copy_from_slice(row.as_ref()), families: Vec::new() }
    }

    pub fn add_family(mut self, family: impl AsRef<[u8]>) -> Self {
        self.families.push(Bytes::copy_from_slice(family.as_ref()));
        self
    }

    /// True if the lookup keeps cells of `family`.
    pub fn wants(&self, family: &[u8]) -> bool {
        self.families.is_empty() || self.families.iter().any(|f| f.as_ref() == family)
    }
}

fn default_caching() -> usize {
    100
}

/// Full-table scan. Rows come back in row-key order, `caching` at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub families: Vec<Bytes>,
    pub caching: usize,
}

impl Default for Scan {
    fn default() -> Self {
        Self { families: Vec::new(), caching: default_caching() }
    }
}

impl Scan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_family(mut self, family: impl AsRef<[u8]>) -> Self {
        self.families.push(Bytes::copy_from_slice(family.as_ref()));
        self
    }

    pub fn with_caching(mut self, caching: usize) -> Self {
        self.caching = caching.max(1);
        self
    }

    pub fn wants(&self, family: &[u8]) -> bool {
        self.families.is_empty() || self.families.iter().any(|f| f.as_ref() == family)
    }
}
