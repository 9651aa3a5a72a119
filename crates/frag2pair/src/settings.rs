/// Which pairs are emitted, and which optional columns they carry
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PairSettings {
    /// Include the key's canonical string (the unchanging portion)
    pub include_key: bool,
    pub include_heavy_atom_counts: bool,
    pub include_heavy_atom_ratio: bool,
    /// Emit every pair a second time with its sides swapped
    pub include_reverse: bool,
    pub include_reaction_pattern: bool,
    pub allow_self_transforms: bool,
    /// Group values by canonical string alone, keeping the first ID seen
    pub ignore_ids: bool,
    /// Fail the moment a streamed key reappears after a different one
    pub verify_sorted: bool,
}

impl Default for PairSettings {
    fn default() -> Self {
        Self {
            include_key: true,
            include_heavy_atom_counts: false,
            include_heavy_atom_ratio: false,
            include_reverse: false,
            include_reaction_pattern: false,
            allow_self_transforms: false,
            ignore_ids: false,
            verify_sorted: true,
        }
    }
}
