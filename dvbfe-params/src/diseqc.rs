//! DiSEqC master command value.

use serde::{Deserialize, Serialize};

use crate::error::ParamError;

/// Maximum length of a DiSEqC master command.
pub const DISEQC_MAX_LEN: usize = 6;

/// A DiSEqC master command of up to six bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DiseqcCommand {
    data: [u8; DISEQC_MAX_LEN],
    len: u8,
}

impl DiseqcCommand {
    /// Build a command from raw bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, ParamError> {
        if bytes.is_empty() || bytes.len() > DISEQC_MAX_LEN {
            return Err(ParamError::InvalidDiseqcCommand(format!(
                "length {} not in 1..={}",
                bytes.len(),
                DISEQC_MAX_LEN
            )));
        }
        let mut data = [0u8; DISEQC_MAX_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            data,
            len: bytes.len() as u8,
        })
    }

    /// Parse a hex string such as `"e01038f0"`.
    pub fn from_hex(s: &str) -> Result<Self, ParamError> {
        let s = s.trim();
        if s.len() % 2 != 0 {
            return Err(ParamError::InvalidDiseqcCommand(format!(
                "odd number of hex digits in {:?}",
                s
            )));
        }
        if s.len() / 2 > DISEQC_MAX_LEN {
            return Err(ParamError::InvalidDiseqcCommand(format!(
                "{:?} is longer than {} bytes",
                s, DISEQC_MAX_LEN
            )));
        }
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| {
                        ParamError::InvalidDiseqcCommand(format!("non-hex character in {:?}", s))
                    })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Self::new(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Display for DiseqcCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
