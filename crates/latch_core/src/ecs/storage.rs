// storage.rs - Byte columns keyed by entity slot
//
// Each component type owns one tightly packed column of raw bytes. Rows are
// addressed through a sparse index (entity slot -> row) and removed with
// swap-remove, so the column never holds holes.

use crate::ecs::{ComponentMeta, EntityIndex};
use std::collections::HashMap;

/// A raw byte column for a single component type.
#[derive(Debug)]
pub struct ComponentColumn {
    meta: ComponentMeta,
    bytes: Vec<u8>,
    owners: Vec<EntityIndex>,
    rows: HashMap<EntityIndex, usize>,
}

impl ComponentColumn {
    pub fn new(meta: ComponentMeta) -> Self {
        Self {
            meta,
            bytes: Vec::new(),
            owners: Vec::new(),
            rows: HashMap::new(),
        }
    }

    #[inline]
    pub fn meta(&self) -> &ComponentMeta {
        &self.meta
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.meta.size
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn contains(&self, owner: EntityIndex) -> bool {
        self.rows.contains_key(&owner)
    }

    /// Insert or overwrite the row for `owner`. `src` must be exactly one stride.
    pub fn insert(&mut self, owner: EntityIndex, src: &[u8]) {
        debug_assert_eq!(src.len(), self.stride());
        if let Some(&row) = self.rows.get(&owner) {
            self.row_mut(row).copy_from_slice(src);
            return;
        }
        let row = self.owners.len();
        self.bytes.extend_from_slice(src);
        self.owners.push(owner);
        self.rows.insert(owner, row);
    }

    /// Remove the row for `owner`, moving the last row into its place.
    pub fn remove(&mut self, owner: EntityIndex) -> bool {
        let Some(row) = self.rows.remove(&owner) else {
            return false;
        };
        let stride = self.stride();
        let last = self.owners.len() - 1;
        if row != last {
            let (head, tail) = self.bytes.split_at_mut(last * stride);
            head[row * stride..(row + 1) * stride].copy_from_slice(&tail[..stride]);
            let moved = self.owners[last];
            self.owners[row] = moved;
            self.rows.insert(moved, row);
        }
        self.owners.pop();
        self.bytes.truncate(last * stride);
        true
    }

    pub fn get(&self, owner: EntityIndex) -> Option<&[u8]> {
        let row = *self.rows.get(&owner)?;
        let stride = self.stride();
        Some(&self.bytes[row * stride..(row + 1) * stride])
    }

    pub fn get_mut(&mut self, owner: EntityIndex) -> Option<&mut [u8]> {
        let row = *self.rows.get(&owner)?;
        Some(self.row_mut(row))
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.bytes[row * stride..(row + 1) * stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::FieldKind;

    fn column() -> ComponentColumn {
        ComponentColumn::new(ComponentMeta::from_fields(
            1,
            "Pair",
            &[("a", FieldKind::U32), ("b", FieldKind::U32)],
        ))
    }

    fn row(a: u32, b: u32) -> Vec<u8> {
        let mut v = a.to_le_bytes().to_vec();
        v.extend_from_slice(&b.to_le_bytes());
        v
    }

    #[test]
    fn test_insert_overwrites_existing_row() {
        let mut col = column();
        col.insert(3, &row(1, 2));
        col.insert(3, &row(5, 6));
        assert_eq!(col.len(), 1);
        assert_eq!(col.get(3), Some(row(5, 6).as_slice()));
    }

    #[test]
    fn test_swap_remove_keeps_other_rows_addressable() {
        let mut col = column();
        col.insert(0, &row(0, 0));
        col.insert(1, &row(1, 1));
        col.insert(2, &row(2, 2));

        assert!(col.remove(0));
        assert!(!col.remove(0));
        assert_eq!(col.len(), 2);
        assert_eq!(col.get(2), Some(row(2, 2).as_slice()));
        assert_eq!(col.get(1), Some(row(1, 1).as_slice()));
        assert_eq!(col.get(0), None);
    }

    #[test]
    fn test_remove_last_row() {
        let mut col = column();
        col.insert(4, &row(9, 9));
        assert!(col.remove(4));
        assert!(col.is_empty());
        assert!(!col.contains(4));
    }
}
