/// Which fragment indices of a session have been written.
///
/// Grows on demand so a HEADER declaring a huge size costs nothing until
/// fragments actually arrive.
#[derive(Debug, Default, Clone)]
pub struct FragmentSet {
    bits: Vec<u64>,
    count: u32,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `index` received. Returns true if it was newly received (not duplicate).
    pub fn insert(&mut self, index: u32) -> bool {
        let word = index as usize / 64;
        let mask = 1u64 << (index % 64);
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        if self.bits[word] & mask != 0 {
            return false;
        }
        self.bits[word] |= mask;
        self.count += 1;
        true
    }

    pub fn contains(&self, index: u32) -> bool {
        let word = index as usize / 64;
        match self.bits.get(word) {
            Some(bits) => bits & (1u64 << (index % 64)) != 0,
            None => false,
        }
    }

    /// Distinct indices received.
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Up to `limit` indices in `0..expected` never received, ascending.
    pub fn missing(&self, expected: u32, limit: usize) -> Vec<u32> {
        (0..expected)
            .filter(|&i| !self.contains(i))
            .take(limit)
            .collect()
    }
}
