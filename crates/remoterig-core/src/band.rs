//! Band table with last-tuned-frequency memory.
//!
//! The radio's band-stacking behavior is reproduced with a fixed table of
//! fifteen rows: the amateur bands from 1.9 MHz through 430 MHz, the WFM
//! broadcast and airband receive ranges, and a final catch-all "GENE"
//! (general coverage) row. Stepping between bands restores the last
//! frequency tuned within the target band.

/// Index of the catch-all general-coverage row.
pub const GENE_BAND_IDX: usize = 14;

/// One row of the band table.
#[derive(Debug, Clone, Copy)]
struct BandRow {
    /// Lower edge in hertz (inclusive).
    freq_from: u64,
    /// Upper edge in hertz (inclusive).
    freq_to: u64,
    /// Last frequency tuned within this band, 0 if never visited.
    freq: u64,
    /// Display label.
    label: &'static str,
}

/// The fixed fifteen-row band table.
///
/// Row edges are the radio's band-stacking register ranges, wider than the
/// amateur allocations so that band-edge excursions still resolve to the
/// band. The GENE row matches nothing by range and is the fallback.
#[derive(Debug, Clone)]
pub struct BandTable {
    rows: [BandRow; 15],
}

impl Default for BandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BandTable {
    /// Creates the table with no tuned-frequency memory.
    pub fn new() -> Self {
        BandTable {
            rows: [
                row(1_800_000, 1_999_999, "1.9"),
                row(3_400_000, 4_099_999, "3.5"),
                row(6_900_000, 7_499_999, "7"),
                row(9_900_000, 10_499_999, "10"),
                row(13_900_000, 14_499_999, "14"),
                row(17_900_000, 18_499_999, "18"),
                row(20_900_000, 21_499_999, "21"),
                row(24_400_000, 25_099_999, "24"),
                row(28_000_000, 29_999_999, "28"),
                row(50_000_000, 54_000_000, "50"),
                row(74_800_000, 107_999_999, "WFM"),
                row(108_000_000, 136_999_999, "AIR"),
                row(144_000_000, 148_000_000, "144"),
                row(420_000_000, 450_000_000, "430"),
                row(0, 0, "GENE"),
            ],
        }
    }

    /// Returns the index of the band containing `freq_hz`, or
    /// [`GENE_BAND_IDX`] if no row's range contains it, and records the
    /// frequency as the band's last-tuned memory.
    pub fn update(&mut self, freq_hz: u64) -> usize {
        for (i, r) in self.rows.iter_mut().enumerate() {
            if freq_hz >= r.freq_from && freq_hz <= r.freq_to {
                r.freq = freq_hz;
                return i;
            }
        }
        GENE_BAND_IDX
    }

    /// Returns the index of the band containing `freq_hz` without touching
    /// the memory.
    pub fn lookup(&self, freq_hz: u64) -> usize {
        self.rows
            .iter()
            .position(|r| freq_hz >= r.freq_from && freq_hz <= r.freq_to)
            .unwrap_or(GENE_BAND_IDX)
    }

    /// The frequency to tune when stepping up from `from_idx`, wrapping
    /// past the last row. Uses the target band's memory, falling back to
    /// its range midpoint.
    pub fn step_up(&self, from_idx: usize) -> u64 {
        let i = (from_idx + 1) % self.rows.len();
        let r = &self.rows[i];
        if r.freq != 0 {
            r.freq
        } else {
            (r.freq_from + r.freq_to) / 2
        }
    }

    /// The frequency to tune when stepping down from `from_idx`, wrapping
    /// past the first row. Uses the target band's memory, falling back to
    /// its lower edge.
    pub fn step_down(&self, from_idx: usize) -> u64 {
        let i = if from_idx == 0 {
            self.rows.len() - 1
        } else {
            from_idx - 1
        };
        let r = &self.rows[i];
        if r.freq != 0 { r.freq } else { r.freq_from }
    }

    /// Display label for a band index.
    pub fn label(&self, idx: usize) -> &'static str {
        self.rows.get(idx).map(|r| r.label).unwrap_or("GENE")
    }
}

fn row(freq_from: u64, freq_to: u64, label: &'static str) -> BandRow {
    BandRow {
        freq_from,
        freq_to,
        freq: 0,
        label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_bands() {
        let t = BandTable::new();
        assert_eq!(t.lookup(1_840_000), 0);
        assert_eq!(t.lookup(3_573_000), 1);
        assert_eq!(t.lookup(7_074_000), 2);
        assert_eq!(t.lookup(14_250_000), 4);
        assert_eq!(t.lookup(21_074_000), 6);
        assert_eq!(t.lookup(28_074_000), 8);
        assert_eq!(t.lookup(50_313_000), 9);
        assert_eq!(t.lookup(145_500_000), 12);
        assert_eq!(t.lookup(433_000_000), 13);
    }

    #[test]
    fn lookup_broadcast_ranges() {
        let t = BandTable::new();
        assert_eq!(t.label(t.lookup(100_000_000)), "WFM");
        assert_eq!(t.label(t.lookup(120_000_000)), "AIR");
    }

    #[test]
    fn lookup_unmatched_is_gene() {
        let t = BandTable::new();
        assert_eq!(t.lookup(5_000_000), GENE_BAND_IDX);
        assert_eq!(t.lookup(200_000_000), GENE_BAND_IDX);
        assert_eq!(t.label(GENE_BAND_IDX), "GENE");
    }

    #[test]
    fn band_edges_inclusive() {
        let t = BandTable::new();
        assert_eq!(t.lookup(1_800_000), 0);
        assert_eq!(t.lookup(1_999_999), 0);
        assert_eq!(t.lookup(1_799_999), GENE_BAND_IDX);
        assert_eq!(t.lookup(13_900_000), 4);
        assert_eq!(t.lookup(14_499_999), 4);
    }

    #[test]
    fn update_records_memory() {
        let mut t = BandTable::new();
        assert_eq!(t.update(14_250_000), 4);
        // Stepping up from 10 MHz lands on the remembered 20 m frequency.
        assert_eq!(t.step_up(3), 14_250_000);
    }

    #[test]
    fn step_up_without_memory_uses_midpoint() {
        let t = BandTable::new();
        // 7 MHz row: (6_900_000 + 7_499_999) / 2
        assert_eq!(t.step_up(1), (6_900_000 + 7_499_999) / 2);
    }

    #[test]
    fn step_down_without_memory_uses_lower_edge() {
        let t = BandTable::new();
        assert_eq!(t.step_down(2), 3_400_000);
    }

    #[test]
    fn step_wraps_at_table_edges() {
        let t = BandTable::new();
        // Up from GENE wraps to the 1.9 MHz band.
        assert_eq!(t.step_up(GENE_BAND_IDX), (1_800_000 + 1_999_999) / 2);
        // Down from the first band wraps to GENE; its range is empty so
        // the lower edge (0) comes back.
        assert_eq!(t.step_down(0), 0);
    }
}
