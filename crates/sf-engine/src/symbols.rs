//! Symbol definitions.

use serde::{Deserialize, Serialize};
use sf_core::Index;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Regular,
    Wild,
    Scatter,
}

/// A reel symbol. Ids are 1-based; 0 denotes an empty grid cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: Index,
    pub name: String,
    pub kind: SymbolKind,
    /// Pay values in bet multiples, indexed by match count - 1.
    pub pays: Vec<f64>,
}

impl Symbol {
    pub fn regular(id: Index, name: &str, pays: &[f64]) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: SymbolKind::Regular,
            pays: pays.to_vec(),
        }
    }

    pub fn wild(id: Index, name: &str, pays: &[f64]) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: SymbolKind::Wild,
            pays: pays.to_vec(),
        }
    }

    pub fn scatter(id: Index, name: &str, pays: &[f64]) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: SymbolKind::Scatter,
            pays: pays.to_vec(),
        }
    }

    /// Pay value for a match count; counts beyond the table cap at the
    /// last entry.
    pub fn pay(&self, count: u8) -> f64 {
        if count == 0 || self.pays.is_empty() {
            return 0.0;
        }
        let ix = (count as usize - 1).min(self.pays.len() - 1);
        self.pays[ix]
    }
}

/// The full symbol set for a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSet {
    symbols: Vec<Symbol>,
    wild: Option<Index>,
    scatter: Option<Index>,
}

impl SymbolSet {
    pub fn new(symbols: Vec<Symbol>) -> Result<Self, ConfigError> {
        if symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        for (ix, s) in symbols.iter().enumerate() {
            if s.id == 0 || symbols[..ix].iter().any(|o| o.id == s.id) {
                return Err(ConfigError::UnknownSymbol(s.id));
            }
        }
        let wild = symbols.iter().find(|s| s.kind == SymbolKind::Wild).map(|s| s.id);
        let scatter = symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Scatter)
            .map(|s| s.id);
        Ok(Self {
            symbols,
            wild,
            scatter,
        })
    }

    pub fn get(&self, id: Index) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: Index) -> bool {
        self.get(id).is_some()
    }

    pub fn wild_id(&self) -> Option<Index> {
        self.wild
    }

    pub fn scatter_id(&self) -> Option<Index> {
        self.scatter
    }

    pub fn is_wild(&self, id: Index) -> bool {
        self.wild == Some(id)
    }

    /// Pay value for a symbol and match count; unknown symbols pay nothing.
    pub fn pay(&self, id: Index, count: u8) -> f64 {
        self.get(id).map(|s| s.pay(count)).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Ids of the regular (non-wild, non-scatter) symbols.
    pub fn regular_ids(&self) -> Vec<Index> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Regular)
            .map(|s| s.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_set() -> SymbolSet {
        SymbolSet::new(vec![
            Symbol::regular(1, "Cherry", &[0.0, 0.0, 0.5, 1.0, 2.0]),
            Symbol::regular(2, "Seven", &[0.0, 0.0, 2.0, 5.0, 20.0]),
            Symbol::wild(11, "Wild", &[]),
            Symbol::scatter(12, "Scatter", &[0.0, 0.0, 2.0, 10.0, 50.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_symbol_pay_caps_at_table_end() {
        let s = Symbol::regular(1, "Cherry", &[0.0, 0.0, 0.5, 1.0, 2.0]);
        assert_eq!(s.pay(0), 0.0);
        assert_eq!(s.pay(3), 0.5);
        assert_eq!(s.pay(5), 2.0);
        assert_eq!(s.pay(8), 2.0);
    }

    #[test]
    fn test_symbol_set_discovers_special_ids() {
        let set = demo_set();
        assert_eq!(set.wild_id(), Some(11));
        assert_eq!(set.scatter_id(), Some(12));
        assert_eq!(set.regular_ids(), vec![1, 2]);
    }

    #[test]
    fn test_symbol_set_rejects_duplicates_and_zero() {
        let dup = SymbolSet::new(vec![
            Symbol::regular(1, "A", &[]),
            Symbol::regular(1, "B", &[]),
        ]);
        assert_eq!(dup.unwrap_err(), ConfigError::UnknownSymbol(1));

        let zero = SymbolSet::new(vec![Symbol::regular(0, "Z", &[])]);
        assert!(zero.is_err());
    }
}
