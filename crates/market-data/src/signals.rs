use crate::error::DataError;
use core_types::AssetGroup;
use serde::{Deserialize, Serialize};

/// Entry and exit signals per asset, one flag per panel row.
///
/// Signals are produced upstream (e.g. by an indicator crossover) and only consumed
/// here, where they drive a signal-based allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPanel {
    pub columns: Vec<SignalColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalColumn {
    pub symbol: String,
    pub entries: Vec<bool>,
    pub exits: Vec<bool>,
}

impl SignalPanel {
    /// Picks out the columns of a group's assets, in group order, checking every column
    /// covers `len` rows.
    pub fn for_group(&self, group: &AssetGroup, len: usize) -> Result<(Vec<Vec<bool>>, Vec<Vec<bool>>), DataError> {
        let mut entries = Vec::with_capacity(group.len());
        let mut exits = Vec::with_capacity(group.len());

        for symbol in &group.assets {
            let column = self
                .columns
                .iter()
                .find(|c| &c.symbol == symbol)
                .ok_or_else(|| DataError::Signals(format!("no signals for asset '{}'", symbol)))?;
            if column.entries.len() != len || column.exits.len() != len {
                return Err(DataError::Signals(format!(
                    "signals for '{}' cover {}/{} rows but the panel has {}",
                    symbol,
                    column.entries.len(),
                    column.exits.len(),
                    len
                )));
            }
            entries.push(column.entries.clone());
            exits.push(column.exits.clone());
        }

        Ok((entries, exits))
    }
}
