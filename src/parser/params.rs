//! CSI parameter accumulation
//!
//! Parameters are collected byte by byte while the parser sits in the CSI
//! states, so a sequence split across reads needs no buffering.

/// Maximum number of parameters we'll track; extras are dropped
pub const MAX_PARAMS: usize = 32;
/// Every value saturates here
pub const MAX_PARAM_VALUE: u16 = 16384;

/// CSI parameters: `;` separates parameters, `:` sub-parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    /// 0 means default/unspecified
    values: Vec<u16>,
    /// Values following the first `:` of each parameter
    subparams: Vec<Vec<u16>>,
    current: u16,
    in_subparam: bool,
    /// A byte has been seen since the last commit
    dirty: bool,
    /// Parameters past `MAX_PARAMS` were dropped
    overflowed: bool,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Params with the given top-level values
    pub fn from_slice(values: &[u16]) -> Self {
        Self {
            values: values.iter().map(|v| (*v).min(MAX_PARAM_VALUE)).collect(),
            subparams: vec![Vec::new(); values.len()],
            ..Self::default()
        }
    }

    /// Parse a whole parameter string at once
    pub fn parse(bytes: &[u8]) -> Self {
        let mut params = Self::new();
        for &byte in bytes {
            params.push_byte(byte);
        }
        params.finish();
        params
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.subparams.clear();
        self.current = 0;
        self.in_subparam = false;
        self.dirty = false;
        self.overflowed = false;
    }

    /// Feed a digit, `;` or `:`
    pub(crate) fn push_byte(&mut self, byte: u8) {
        self.dirty = true;
        match byte {
            b'0'..=b'9' => {
                self.current = self
                    .current
                    .saturating_mul(10)
                    .saturating_add(u16::from(byte - b'0'))
                    .min(MAX_PARAM_VALUE);
            }
            b':' => {
                self.commit();
                self.in_subparam = true;
            }
            b';' => {
                self.commit();
                self.in_subparam = false;
            }
            _ => {}
        }
    }

    /// Commit the trailing parameter once the final byte arrives
    pub(crate) fn finish(&mut self) {
        if self.dirty {
            self.commit();
        }
        self.in_subparam = false;
        self.dirty = false;
    }

    fn commit(&mut self) {
        let value = std::mem::take(&mut self.current);
        if self.in_subparam {
            if !self.overflowed {
                if let Some(subs) = self.subparams.last_mut() {
                    subs.push(value);
                }
            }
        } else if self.values.len() < MAX_PARAMS {
            self.values.push(value);
            self.subparams.push(Vec::new());
        } else {
            self.overflowed = true;
        }
    }

    /// Parameter at index, `None` if absent or 0
    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied().filter(|&v| v != 0)
    }

    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        self.get(index).unwrap_or(default)
    }

    /// Raw value at index (0 if not present)
    pub fn raw(&self, index: usize) -> u16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn subparams(&self, index: usize) -> &[u16] {
        if index < self.values.len() {
            self.subparams.get(index).map_or(&[], Vec::as_slice)
        } else {
            &[]
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.iter().copied()
    }

    /// Each parameter with its sub-parameters
    pub fn groups(&self) -> impl Iterator<Item = (u16, &[u16])> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, &v)| (v, self.subparams(i)))
    }
}
