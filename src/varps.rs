//! Varp decoding for tasks-tracker.
//!
//! The client exposes task completion as packed 32-bit varps. Each task type
//! owns an ordered list of varp ids; the position of a varp in that list is
//! its ordinal, and the varp at ordinal `k` encodes tasks `k*32 ..= k*32+31`
//! with task `id` stored at bit `id % 32`.
//!
//! Leagues reuse the same varps from one season to the next, so a varp id can
//! belong to more than one task type. [`VarpDecoder`] checks its mappings in a
//! fixed priority order and the first match wins: Combat, then League IV, then
//! League III.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::task::TaskType;

/// Number of task flags packed into one varp.
pub const TASKS_PER_VARP: u32 = 32;

const COMBAT_TASK_VARPS: &[u32] = &[
    3116, 3117, 3118, 3119, 3120, 3121, 3122, 3123, 3124, 3125, 3126, 3127, 3128, 3387, 3718,
    3773, 3774, 4204, 4496, 4721,
];

const LEAGUE_TASK_VARPS: &[u32] = &[
    2616, 2617, 2618, 2619, 2620, 2621, 2622, 2623, 2624, 2625, 2626, 2627, 2628, 2629, 2630,
    2631, 2808, 2809, 2810, 2811, 2812, 2813, 2814, 2815, 2816, 2817, 2818, 2819, 2820, 2821,
    2822, 2823,
];

/// Immutable varp id <-> ordinal table for one task type.
#[derive(Debug, Clone)]
pub struct VarpMapping {
    task_type: TaskType,
    varp_ids: Vec<u32>,
    ordinals: HashMap<u32, usize>,
}

impl VarpMapping {
    /// Build a mapping; a repeated varp id keeps its first ordinal.
    pub fn new(task_type: TaskType, varp_ids: &[u32]) -> Self {
        let mut ordinals = HashMap::with_capacity(varp_ids.len());
        for (ordinal, varp_id) in varp_ids.iter().enumerate() {
            ordinals.entry(*varp_id).or_insert(ordinal);
        }
        Self {
            task_type,
            varp_ids: varp_ids.to_vec(),
            ordinals,
        }
    }

    /// The tables shipped with the plugin.
    pub fn builtin(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Combat => Self::new(task_type, COMBAT_TASK_VARPS),
            TaskType::League3 | TaskType::League4 => Self::new(task_type, LEAGUE_TASK_VARPS),
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn ordinal(&self, varp_id: u32) -> Option<usize> {
        self.ordinals.get(&varp_id).copied()
    }

    pub fn varp_id(&self, ordinal: usize) -> Option<u32> {
        self.varp_ids.get(ordinal).copied()
    }

    pub fn varp_ids(&self) -> &[u32] {
        &self.varp_ids
    }
}

/// Where a varp lands: which task type and which 32-task window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVarp {
    pub task_type: TaskType,
    pub ordinal: usize,
}

impl ResolvedVarp {
    /// First task id covered by this varp.
    pub fn first_task_id(&self) -> u32 {
        window_start(self.ordinal)
    }
}

/// Completion flags decoded from one varp value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVarp {
    pub varp_id: u32,
    pub task_type: TaskType,
    pub completion: BTreeMap<u32, bool>,
}

/// Ordered set of [`VarpMapping`]s; earlier mappings win on overlap.
#[derive(Debug, Clone)]
pub struct VarpDecoder {
    mappings: Vec<VarpMapping>,
}

impl Default for VarpDecoder {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VarpDecoder {
    /// Resolution order for overlapping varp ids.
    pub const PRIORITY: [TaskType; 3] = [TaskType::Combat, TaskType::League4, TaskType::League3];

    pub fn builtin() -> Self {
        Self::new(
            Self::PRIORITY
                .into_iter()
                .map(VarpMapping::builtin)
                .collect(),
        )
    }

    /// Mappings are checked in the order given.
    pub fn new(mappings: Vec<VarpMapping>) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &[VarpMapping] {
        &self.mappings
    }

    pub fn mapping(&self, task_type: TaskType) -> Option<&VarpMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.task_type() == task_type)
    }

    pub fn resolve(&self, varp_id: u32) -> Result<ResolvedVarp> {
        self.mappings
            .iter()
            .find_map(|mapping| {
                mapping.ordinal(varp_id).map(|ordinal| ResolvedVarp {
                    task_type: mapping.task_type(),
                    ordinal,
                })
            })
            .ok_or(Error::UnresolvedSource(varp_id))
    }

    /// Resolve `varp_id` and unpack `raw` into per-task completion flags.
    pub fn decode(&self, varp_id: u32, raw: u64) -> Result<DecodedVarp> {
        let resolved = self.resolve(varp_id)?;
        Ok(DecodedVarp {
            varp_id,
            task_type: resolved.task_type,
            completion: decode_window(varp_id, resolved.ordinal, raw),
        })
    }

    /// Every known varp id, deduplicated, in priority order.
    pub fn all_sources(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        self.mappings
            .iter()
            .flat_map(|mapping| mapping.varp_ids().iter().copied())
            .filter(|varp_id| seen.insert(*varp_id))
            .collect()
    }
}

/// Client varps are signed ints; keep the two's complement bit pattern.
pub fn varp_bits(value: i32) -> u64 {
    u64::from(value as u32)
}

fn window_start(ordinal: usize) -> u32 {
    u32::try_from(ordinal)
        .ok()
        .and_then(|ordinal| ordinal.checked_mul(TASKS_PER_VARP))
        .unwrap_or(u32::MAX - (TASKS_PER_VARP - 1))
}

/// Flags for ids `ordinal*32 ..= ordinal*32+31`, bit `id % 32` of `raw`.
pub fn decode_window(varp_id: u32, ordinal: usize, raw: u64) -> BTreeMap<u32, bool> {
    let first = window_start(ordinal);
    (first..=first + (TASKS_PER_VARP - 1))
        .map(|id| {
            let bit = id % TASKS_PER_VARP;
            let completed = test_bit(raw, bit).unwrap_or_else(|| {
                tracing::warn!(varp_id, bit, "bit index outside varp width");
                false
            });
            (id, completed)
        })
        .collect()
}

/// Pack the completion of window `ordinal` back into a client varp value.
pub fn encode_window(ordinal: usize, completed: impl Fn(u32) -> bool) -> i32 {
    let first = window_start(ordinal);
    let bits = (0..TASKS_PER_VARP)
        .filter(|bit| completed(first + bit))
        .fold(0u32, |acc, bit| acc | (1 << bit));
    bits as i32
}

fn test_bit(raw: u64, bit: u32) -> Option<bool> {
    raw.checked_shr(bit).map(|shifted| shifted & 1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolution_prefers_league_four_over_league_three() {
        let decoder = VarpDecoder::builtin();
        let resolved = decoder.resolve(2616).unwrap();
        assert_eq!(resolved.task_type, TaskType::League4);
        assert_eq!(resolved.ordinal, 0);

        let resolved = decoder.resolve(3118).unwrap();
        assert_eq!(resolved.task_type, TaskType::Combat);
        assert_eq!(resolved.first_task_id(), 64);
    }

    #[test]
    fn encode_window_matches_decode_window() {
        let value = encode_window(2, |id| id == 64 || id == 66 || id == 95);
        assert_eq!(value as u32, 0b101 | (1 << 31));
        let flags = decode_window(9001, 2, varp_bits(value));
        assert!(flags[&64] && flags[&66] && flags[&95]);
        assert!(!flags[&65]);
    }

    #[test]
    fn unknown_varp_is_unresolved() {
        let decoder = VarpDecoder::builtin();
        assert!(matches!(
            decoder.resolve(1),
            Err(Error::UnresolvedSource(1))
        ));
    }

    #[test]
    fn decode_window_reads_every_bit() {
        let raw = 0b1000_0000_0000_0000_0000_0000_0000_0101u64;
        let flags = decode_window(10, 1, raw);
        assert_eq!(flags.len(), 32);
        assert!(flags[&32]);
        assert!(!flags[&33]);
        assert!(flags[&34]);
        assert!(flags[&63]);
        assert_eq!(flags.keys().next(), Some(&32));
        assert_eq!(flags.keys().last(), Some(&63));
    }

    #[test]
    fn negative_varp_values_keep_the_sign_bit() {
        let flags = decode_window(10, 0, varp_bits(-1));
        assert!(flags.values().all(|completed| *completed));
        let flags = decode_window(10, 0, varp_bits(i32::MIN));
        assert!(flags[&31]);
        assert!(!flags[&30]);
    }

    #[test]
    fn all_sources_deduplicates_shared_league_varps() {
        let decoder = VarpDecoder::builtin();
        let sources = decoder.all_sources();
        assert_eq!(
            sources.len(),
            COMBAT_TASK_VARPS.len() + LEAGUE_TASK_VARPS.len()
        );
        assert_eq!(sources[0], COMBAT_TASK_VARPS[0]);
    }

    #[test]
    fn repeated_varp_keeps_first_ordinal() {
        let mapping = VarpMapping::new(TaskType::Combat, &[5, 6, 5]);
        assert_eq!(mapping.ordinal(5), Some(0));
        assert_eq!(mapping.varp_id(2), Some(5));
    }
}
