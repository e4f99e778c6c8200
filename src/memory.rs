//! The segmented memory map: an address-indexed, append-only log of
//! segments per address plane, where the most recently added segment
//! shadows earlier ones on every byte it covers.

use std::sync::Arc;

use crate::error::{Error, Result};

/// `Fn(address, count, offset, physical) -> Result<Vec<u8>>`, must return
/// exactly `count` bytes. `offset` is measured from the segment's base.
pub type ReadCallback = Box<dyn Fn(u64, usize, u64, bool) -> Result<Vec<u8>>>;

struct Segment {
    address: u64,
    length: u64,
    read_fn: ReadCallback,
}

/// Two independent interval logs, one per address plane.
#[derive(Default)]
pub struct MemoryMap {
    virtual_segments: Vec<Segment>,
    physical_segments: Vec<Segment>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a segment `[address, address+length)`. Never fails, never
    /// evicts an earlier segment: later reads simply prefer this one on any
    /// byte it covers.
    pub fn add_segment<F>(&mut self, address: u64, length: u64, read_fn: F, physical: bool)
    where
        F: Fn(u64, usize, u64, bool) -> Result<Vec<u8>> + 'static,
    {
        let segment = Segment {
            address,
            length,
            read_fn: Box::new(read_fn),
        };
        self.plane_mut(physical).push(segment);
    }

    /// Install the virtual (and, if `paddr` given, physical) segment for a
    /// `PT_LOAD` core-dump program header. Bytes past `data.len()` up to
    /// `memsz` read as zero.
    pub fn install_load_segment(&mut self, vaddr: u64, paddr: Option<u64>, data: Vec<u8>, memsz: Option<u64>) {
        let length = memsz.unwrap_or(data.len() as u64).max(data.len() as u64);
        let data = Arc::new(data);
        let make_callback = {
            let data = Arc::clone(&data);
            move |_address: u64, count: usize, offset: u64, _physical: bool| -> Result<Vec<u8>> {
                zero_filled_read(&data, offset, count)
            }
        };
        self.add_segment(vaddr, length, make_callback, false);
        if let Some(paddr) = paddr {
            let make_callback = move |_address: u64, count: usize, offset: u64, _physical: bool| -> Result<Vec<u8>> {
                zero_filled_read(&data, offset, count)
            };
            self.add_segment(paddr, length, make_callback, true);
        }
    }

    fn plane(&self, physical: bool) -> &[Segment] {
        if physical {
            &self.physical_segments
        } else {
            &self.virtual_segments
        }
    }

    fn plane_mut(&mut self, physical: bool) -> &mut Vec<Segment> {
        if physical {
            &mut self.physical_segments
        } else {
            &mut self.virtual_segments
        }
    }

    /// Read `count` bytes starting at `address` from the chosen plane.
    /// Decomposes the range into maximal runs owned by the newest
    /// covering segment, invokes each run's callback once, and concatenates
    /// the results in address order.
    pub fn read(&self, address: u64, count: usize, physical: bool) -> Result<Vec<u8>> {
        let segments = self.plane(physical);

        // owner[i] = index of the newest segment covering byte address+i.
        // Segments are painted oldest-first so later entries overwrite
        // earlier ones, which is exactly newest-wins.
        let mut owner: Vec<Option<usize>> = vec![None; count];
        for (idx, segment) in segments.iter().enumerate() {
            let seg_end = segment.address.saturating_add(segment.length);
            let lo = address.max(segment.address);
            let hi = address.saturating_add(count as u64).min(seg_end);
            if lo >= hi {
                continue;
            }
            let start = (lo - address) as usize;
            let end = (hi - address) as usize;
            for slot in &mut owner[start..end] {
                *slot = Some(idx);
            }
        }

        let mut result = Vec::with_capacity(count);
        let mut i = 0;
        while i < count {
            match owner[i] {
                None => return Err(Error::fault(address + i as u64)),
                Some(idx) => {
                    let mut j = i + 1;
                    while j < count && owner[j] == Some(idx) {
                        j += 1;
                    }
                    let segment = &segments[idx];
                    let sub_address = address + i as u64;
                    let sub_count = j - i;
                    let sub_offset = sub_address - segment.address;
                    let bytes = (segment.read_fn)(sub_address, sub_count, sub_offset, physical)?;
                    if bytes.len() != sub_count {
                        return Err(Error::value(format!(
                            "read callback returned {} bytes, expected {sub_count}",
                            bytes.len()
                        )));
                    }
                    result.extend_from_slice(&bytes);
                    i = j;
                }
            }
        }
        Ok(result)
    }
}

fn zero_filled_read(data: &[u8], offset: u64, count: usize) -> Result<Vec<u8>> {
    let offset = offset as usize;
    let mut buf = vec![0u8; count];
    if offset < data.len() {
        let available = (data.len() - offset).min(count);
        buf[..available].copy_from_slice(&data[offset..offset + available]);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Call = (u64, usize, u64, bool);

    fn recording_callback(log: Rc<RefCell<Vec<Call>>>, byte: u8) -> impl Fn(u64, usize, u64, bool) -> Result<Vec<u8>> {
        move |address, count, offset, physical| {
            log.borrow_mut().push((address, count, offset, physical));
            Ok(vec![byte; count])
        }
    }

    #[test]
    fn contiguous_segments_concatenate() {
        let data = b"hello, world!\0foobar".to_vec();
        let mut map = MemoryMap::new();
        let d1 = data[0..4].to_vec();
        map.add_segment(0xffff0000, 4, move |_a, c, o, _p| Ok(d1[o as usize..o as usize + c].to_vec()), false);
        let d2 = data[4..14].to_vec();
        map.add_segment(0xffff0004, 10, move |_a, c, o, _p| Ok(d2[o as usize..o as usize + c].to_vec()), false);
        let read = map.read(0xffff0000, 14, false).unwrap();
        assert_eq!(read, b"hello, world!\0");
    }

    #[test]
    fn new_fully_inside_old_splits_into_flanks() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        map.add_segment(0xffff0000, 128, recording_callback(log.clone(), 1), false);
        map.add_segment(0xffff0000, 64, recording_callback(log.clone(), 2), false);
        let _ = map.read(0xffff0000, 128, false).unwrap();
        let calls = log.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&(0xffff0000, 64, 0, false)));
        assert!(calls.contains(&(0xffff0040, 64, 64, false)));
    }

    #[test]
    fn new_fully_covers_old_and_old_is_never_called() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        map.add_segment(0xffff0010, 16, recording_callback(log.clone(), 1), false);
        map.add_segment(0xffff0000, 64, recording_callback(log.clone(), 2), false);
        let _ = map.read(0xffff0000, 64, false).unwrap();
        let calls = log.borrow().clone();
        assert_eq!(calls, vec![(0xffff0000, 64, 0, false)]);
    }

    #[test]
    fn new_extends_past_olds_head_and_tail() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        // new extends past old's tail: old covers head, new covers the rest.
        let mut tail_map = MemoryMap::new();
        tail_map.add_segment(0xffff0000, 32, recording_callback(log.clone(), 1), false);
        tail_map.add_segment(0xffff0010, 32, recording_callback(log.clone(), 2), false);
        let _ = tail_map.read(0xffff0000, 48, false).unwrap();
        assert_eq!(
            log.borrow().clone(),
            vec![(0xffff0000, 16, 0, false), (0xffff0010, 32, 0, false)]
        );
        log.borrow_mut().clear();

        // new extends past old's head: new covers head, old covers remaining tail.
        map.add_segment(0xffff0010, 32, recording_callback(log.clone(), 1), false);
        map.add_segment(0xffff0000, 32, recording_callback(log.clone(), 2), false);
        let _ = map.read(0xffff0000, 48, false).unwrap();
        assert_eq!(
            log.borrow().clone(),
            vec![(0xffff0000, 32, 0, false), (0xffff0020, 16, 0x10, false)]
        );
    }

    #[test]
    fn new_fully_inside_old_splits_into_three_parts() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        map.add_segment(0xffff0000, 128, recording_callback(log.clone(), 1), false);
        map.add_segment(0xffff0020, 64, recording_callback(log.clone(), 2), false);
        let _ = map.read(0xffff0000, 128, false).unwrap();
        let calls = log.borrow().clone();
        assert_eq!(
            calls,
            vec![
                (0xffff0000, 32, 0, false),
                (0xffff0020, 64, 0, false),
                (0xffff0060, 32, 96, false),
            ]
        );
    }

    #[test]
    fn new_spans_gap_between_two_non_adjacent_olds_and_extends_into_each() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        // old1 [0x1000, 0x1020), old2 [0x1040, 0x1060); a 0x20-byte gap
        // between them at [0x1020, 0x1040). new [0x1010, 0x1050) bridges
        // the gap and eats into both olds' tails/heads, but doesn't cover
        // either of them fully.
        map.add_segment(0x1000, 0x20, recording_callback(log.clone(), 1), false);
        map.add_segment(0x1040, 0x20, recording_callback(log.clone(), 2), false);
        map.add_segment(0x1010, 0x40, recording_callback(log.clone(), 3), false);
        let _ = map.read(0x1000, 0x60, false).unwrap();
        let calls = log.borrow().clone();
        assert_eq!(
            calls,
            vec![
                (0x1000, 0x10, 0, false),
                (0x1010, 0x40, 0, false),
                (0x1050, 0x10, 0x10, false),
            ]
        );
    }

    #[test]
    fn new_covers_several_consecutive_olds() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new();
        for i in 0..4u64 {
            map.add_segment(0xffff0000 + i * 0x20, 0x20, recording_callback(log.clone(), 1), false);
        }
        map.add_segment(0xffff0080, 64, recording_callback(log.clone(), 2), false);
        map.add_segment(0xffff0000, 128, recording_callback(log.clone(), 3), false);
        let _ = map.read(0xffff0000, 192, false).unwrap();
        let calls = log.borrow().clone();
        assert_eq!(
            calls,
            vec![(0xffff0000, 128, 0, false), (0xffff0080, 64, 0, false)]
        );
    }

    #[test]
    fn uncovered_byte_faults() {
        let map = MemoryMap::new();
        let err = map.read(0x1000, 4, false).unwrap_err();
        assert!(matches!(err, Error::Fault(_)));
        assert_eq!(err.to_string(), "could not find memory segment");
    }

    #[test]
    fn virtual_and_physical_planes_are_isolated() {
        let mut map = MemoryMap::new();
        map.add_segment(0x1000, 16, |_a, c, _o, _p| Ok(vec![0xAA; c]), false);
        assert!(map.read(0x1000, 4, false).is_ok());
        assert!(map.read(0x1000, 4, true).is_err());
    }

    #[test]
    fn core_dump_segment_zero_fills_past_file_data() {
        let mut map = MemoryMap::new();
        map.install_load_segment(0x400000, Some(0x1000), vec![1, 2, 3, 4], Some(8));
        let read = map.read(0x400000, 8, false).unwrap();
        assert_eq!(read, vec![1, 2, 3, 4, 0, 0, 0, 0]);
        let phys = map.read(0x1000, 8, true).unwrap();
        assert_eq!(phys, vec![1, 2, 3, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn callback_returning_wrong_length_is_a_value_error() {
        let mut map = MemoryMap::new();
        map.add_segment(0x1000, 16, |_a, _c, _o, _p| Ok(vec![0u8; 2]), false);
        let err = map.read(0x1000, 4, false).unwrap_err();
        assert!(matches!(err, Error::Value(_)));
    }
}
