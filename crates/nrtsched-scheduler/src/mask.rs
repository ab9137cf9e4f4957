//! NUMA zone eligibility masks
//!
//! A [`ZoneMask`] is a `BitVec` with one bit per NUMA id, sized to the
//! highest id observed on the node. It is only ever a working set inside one
//! evaluation and is never persisted.
//!
//!```
//!     use nrtsched_core::{NumaZone, ResourceList};
//!     use nrtsched_scheduler::ZoneMask;
//!
//!     let zones = vec![
//!         NumaZone::new(0, ResourceList::new()),
//!         NumaZone::new(2, ResourceList::new()),
//!     ];
//!     let mut mask = ZoneMask::for_zones(&zones);
//!     assert_eq!(mask.width(), 3);
//!     assert!(mask.test(0) && !mask.test(1) && mask.test(2));
//!
//!     mask.clear(0);
//!     assert_eq!(mask.iter_ones().collect::<Vec<_>>(), vec![2]);
//!```

use bitvec::prelude::*;
use nrtsched_core::NumaZone;
use std::fmt;
use std::ops::BitAndAssign;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ZoneMask {
    mask: BitVec<u64, Lsb0>,
}

impl ZoneMask {
    /// Build an empty mask able to hold ids `0..width`
    pub fn with_width(width: usize) -> ZoneMask {
        ZoneMask {
            mask: bitvec![u64, Lsb0; 0; width],
        }
    }

    /// Build a mask with the id of every given zone set
    pub fn for_zones(zones: &[NumaZone]) -> ZoneMask {
        let width = zones.iter().map(|z| z.id + 1).max().unwrap_or(0);
        let mut mask = ZoneMask::with_width(width);
        for zone in zones {
            mask.set(zone.id);
        }
        mask
    }

    /// Number of ids the mask can hold
    pub fn width(&self) -> usize {
        self.mask.len()
    }

    /// Set a zone id, growing the mask if needed
    pub fn set(&mut self, id: usize) {
        if id >= self.mask.len() {
            self.mask.resize(id + 1, false);
        }
        self.mask.set(id, true);
    }

    /// Clear a zone id; ids beyond the width are already clear
    pub fn clear(&mut self, id: usize) {
        if id < self.mask.len() {
            self.mask.set(id, false);
        }
    }

    pub fn test(&self, id: usize) -> bool {
        self.mask.get(id).is_some_and(|bit| *bit)
    }

    pub fn is_empty(&self) -> bool {
        self.mask.not_any()
    }

    pub fn count(&self) -> usize {
        self.mask.count_ones()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter_ones()
    }
}

impl BitAndAssign<&ZoneMask> for ZoneMask {
    fn bitand_assign(&mut self, rhs: &ZoneMask) {
        // Zones past the end of rhs are absent there
        let mut other = rhs.mask.clone();
        other.resize(self.mask.len(), false);
        self.mask &= other;
    }
}

impl fmt::Display for ZoneMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:<", self.mask.len())?;
        for (i, id) in self.iter_ones().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str(">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrtsched_core::ResourceList;

    fn zones(ids: &[usize]) -> Vec<NumaZone> {
        ids.iter()
            .map(|id| NumaZone::new(*id, ResourceList::new()))
            .collect()
    }

    #[test]
    fn test_for_zones_sets_known_ids_only() {
        let mask = ZoneMask::for_zones(&zones(&[1, 3]));
        assert_eq!(mask.width(), 4);
        assert_eq!(mask.count(), 2);
        assert!(!mask.test(0));
        assert!(mask.test(1));
        assert!(!mask.test(2));
        assert!(mask.test(3));
        assert!(!mask.test(64));
    }

    #[test]
    fn test_no_zones_is_empty() {
        let mask = ZoneMask::for_zones(&[]);
        assert_eq!(mask.width(), 0);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_intersect() {
        let mut mask = ZoneMask::for_zones(&zones(&[0, 1, 2]));
        let mut other = ZoneMask::with_width(3);
        other.set(1);
        other.set(2);

        mask &= &other;
        assert_eq!(mask.iter_ones().collect::<Vec<_>>(), vec![1, 2]);

        mask &= &ZoneMask::with_width(0);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_intersect_mismatched_widths() {
        let mut wide = ZoneMask::for_zones(&zones(&[0, 1, 5, 63]));
        let mut narrow = ZoneMask::with_width(2);
        narrow.set(1);
        wide &= &narrow;
        assert_eq!(wide.iter_ones().collect::<Vec<_>>(), vec![1]);
        assert_eq!(wide.width(), 64);

        let mut narrow = ZoneMask::for_zones(&zones(&[0, 1]));
        narrow &= &ZoneMask::for_zones(&zones(&[1, 40]));
        assert_eq!(narrow.iter_ones().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_set_grows_and_clear_out_of_range() {
        let mut mask = ZoneMask::with_width(1);
        mask.set(100);
        assert_eq!(mask.width(), 101);
        assert!(mask.test(100));

        mask.clear(500);
        mask.clear(100);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_display() {
        let mask = ZoneMask::for_zones(&zones(&[0, 2]));
        assert_eq!(mask.to_string(), "3:<0,2>");
    }
}
