//! The slotted heap-page layout.
//!
//! A page stores a fixed number of fixed-width tuples behind a header
//! bitmap. For a page of P bytes holding tuples of W bytes, the slot count
//! is N = floor(P * 8 / (W * 8 + 1)) and the header is ceil(N / 8) bytes;
//! the k-th bit (least-significant first within each byte) is set iff slot
//! k is occupied. The N tuple slots follow the header immediately and any
//! trailing bytes are padding.

use crate::error::{Error, Result};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{page_size, PageId, RecordId};
use bytes::BufMut;
use std::sync::Arc;

/// Number of tuple slots on a page holding tuples of the given schema.
pub fn slots_per_page(desc: &TupleDesc) -> usize {
    (page_size() * 8) / (desc.width() * 8 + 1)
}

fn header_len(slots: usize) -> usize {
    (slots + 7) / 8
}

/// One materialized heap page.
#[derive(Clone, Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    slots: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// A page with every slot empty.
    pub fn empty(pid: PageId, desc: Arc<TupleDesc>) -> HeapPage {
        let n = slots_per_page(&desc);
        HeapPage {
            pid,
            desc,
            slots: vec![None; n],
            dirtier: None,
        }
    }

    /// Materializes a page from its exact on-disk image.
    pub fn from_bytes(pid: PageId, desc: Arc<TupleDesc>, data: &[u8]) -> Result<HeapPage> {
        if data.len() != page_size() {
            return Err(Error::Db(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                page_size()
            )));
        }
        let n = slots_per_page(&desc);
        let header = &data[..header_len(n)];
        let width = desc.width();
        let mut slots = Vec::with_capacity(n);
        for k in 0..n {
            let used = header[k / 8] >> (k % 8) & 1 == 1;
            if used {
                let start = header_len(n) + k * width;
                let mut cursor = &data[start..start + width];
                let mut tuple = Tuple::read_from(&desc, &mut cursor)?;
                tuple.set_rid(Some(RecordId {
                    pid,
                    slot: k as u16,
                }));
                slots.push(Some(tuple));
            } else {
                slots.push(None);
            }
        }
        Ok(HeapPage {
            pid,
            desc,
            slots,
            dirtier: None,
        })
    }

    /// The exact page-size byte image of this page. Round-trips with
    /// [`HeapPage::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.slots.len();
        let mut data = Vec::with_capacity(page_size());

        let mut header = vec![0u8; header_len(n)];
        for (k, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                header[k / 8] |= 1 << (k % 8);
            }
        }
        data.put_slice(&header);

        let width = self.desc.width();
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.write_to(&mut data),
                None => data.put_bytes(0, width),
            }
        }
        data.resize(page_size(), 0);
        data
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn empty_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.is_some())
    }

    /// The tuple stored in the given slot, if any.
    pub fn tuple_at(&self, slot: usize) -> Option<&Tuple> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Places the tuple in the lowest-indexed empty slot and stamps its
    /// record id. Fails when the schema differs from the page's or no slot
    /// is free.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<()> {
        if **tuple.desc() != *self.desc {
            return Err(Error::Db(
                "tuple schema does not match the page schema".to_string(),
            ));
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or_else(|| Error::Db("no empty slot on page".to_string()))?;
        tuple.set_rid(Some(RecordId {
            pid: self.pid,
            slot: slot as u16,
        }));
        self.slots[slot] = Some(tuple);
        Ok(())
    }

    /// Clears the slot named by the tuple's record id. Fails when the tuple
    /// has no record id, names a different page, or the slot is empty.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple
            .rid()
            .ok_or_else(|| Error::Db("tuple has no record id".to_string()))?;
        if rid.pid != self.pid {
            return Err(Error::Db(
                "tuple belongs to a different page".to_string(),
            ));
        }
        let slot = rid.slot as usize;
        if !self.is_slot_used(slot) {
            return Err(Error::Db(format!("slot {slot} is already empty")));
        }
        self.slots[slot] = None;
        Ok(())
    }

    /// The occupied tuples in ascending slot order. A fresh iterator is the
    /// rewind.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().flatten()
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtier = tid;
    }

    /// The transaction that dirtied this page, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Field, Type};

    fn two_int_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::unnamed(&[Type::Int, Type::Int]))
    }

    fn row(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
        Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    fn pid() -> PageId {
        PageId {
            table: 1,
            page_no: 0,
        }
    }

    #[test]
    fn slot_count_follows_the_layout_formula() {
        // 8-byte tuples on a 4096-byte page: floor(32768 / 65) slots.
        let desc = two_int_desc();
        assert_eq!(slots_per_page(&desc), 504);
        let page = HeapPage::empty(pid(), desc);
        assert_eq!(page.slot_count(), 504);
        assert_eq!(page.empty_slot_count(), 504);
    }

    #[test]
    fn empty_page_serializes_to_zeroes() {
        let page = HeapPage::empty(pid(), two_int_desc());
        let data = page.to_bytes();
        assert_eq!(data.len(), crate::page_size());
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn page_image_round_trips() {
        let desc = two_int_desc();
        let mut page = HeapPage::empty(pid(), desc.clone());
        for i in 0..10 {
            page.insert_tuple(row(&desc, i, i * 10)).unwrap();
        }
        // Punch a hole so the bitmap is not a prefix of ones.
        let victim = page.tuple_at(3).unwrap().clone();
        page.delete_tuple(&victim).unwrap();

        let data = page.to_bytes();
        let reloaded = HeapPage::from_bytes(pid(), desc, &data).unwrap();
        assert_eq!(reloaded.to_bytes(), data);
        assert!(!reloaded.is_slot_used(3));
        assert_eq!(reloaded.iter().count(), 9);
        assert_eq!(reloaded.tuple_at(4).unwrap().field(1), &Field::Int(40));
    }

    #[test]
    fn insert_stamps_the_record_id_and_fills_lowest_slot() {
        let desc = two_int_desc();
        let mut page = HeapPage::empty(pid(), desc.clone());
        page.insert_tuple(row(&desc, 1, 1)).unwrap();
        page.insert_tuple(row(&desc, 2, 2)).unwrap();
        let second = page.tuple_at(1).unwrap().clone();
        let first = page.tuple_at(0).unwrap().clone();
        page.delete_tuple(&first).unwrap();

        page.insert_tuple(row(&desc, 3, 3)).unwrap();
        let rid = page.tuple_at(0).unwrap().rid().unwrap();
        assert_eq!(rid.pid, pid());
        assert_eq!(rid.slot, 0);
        assert_eq!(second.rid().unwrap().slot, 1);
    }

    #[test]
    fn insert_rejects_mismatched_schema_and_full_pages() {
        let desc = two_int_desc();
        let other = Arc::new(TupleDesc::unnamed(&[Type::Int]));
        let mut page = HeapPage::empty(pid(), desc.clone());
        let odd = Tuple::new(other, vec![Field::Int(9)]).unwrap();
        assert!(page.insert_tuple(odd).is_err());

        for i in 0..page.slot_count() {
            page.insert_tuple(row(&desc, i as i32, 0)).unwrap();
        }
        assert!(page.insert_tuple(row(&desc, -1, -1)).is_err());
    }

    #[test]
    fn delete_requires_a_matching_occupied_slot() {
        let desc = two_int_desc();
        let mut page = HeapPage::empty(pid(), desc.clone());
        let unplaced = row(&desc, 1, 1);
        assert!(page.delete_tuple(&unplaced).is_err());

        page.insert_tuple(row(&desc, 1, 1)).unwrap();
        let mut elsewhere = page.tuple_at(0).unwrap().clone();
        elsewhere.set_rid(Some(RecordId {
            pid: PageId {
                table: 1,
                page_no: 7,
            },
            slot: 0,
        }));
        assert!(page.delete_tuple(&elsewhere).is_err());

        let stored = page.tuple_at(0).unwrap().clone();
        page.delete_tuple(&stored).unwrap();
        assert!(page.delete_tuple(&stored).is_err());
    }

    #[test]
    fn iterator_walks_occupied_slots_in_ascending_order() {
        let desc = two_int_desc();
        let mut page = HeapPage::empty(pid(), desc.clone());
        for i in 0..5 {
            page.insert_tuple(row(&desc, i, 0)).unwrap();
        }
        let third = page.tuple_at(2).unwrap().clone();
        page.delete_tuple(&third).unwrap();
        let keys: Vec<i32> = page
            .iter()
            .map(|t| match t.field(0) {
                Field::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![0, 1, 3, 4]);
    }

    #[test]
    fn dirty_tracking_remembers_the_transaction() {
        let mut page = HeapPage::empty(pid(), two_int_desc());
        assert!(!page.is_dirty());
        let tid = TransactionId::new();
        page.mark_dirty(Some(tid));
        assert!(page.is_dirty());
        assert_eq!(page.dirtier(), Some(tid));
        page.mark_dirty(None);
        assert!(!page.is_dirty());
    }
}
