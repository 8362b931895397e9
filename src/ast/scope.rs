//! Tablas de símbolos.

use indexmap::IndexMap;

use super::NodeId;
use crate::lex::Identifier;

/// Asociación local de identificadores a constructos.
///
/// Las búsquedas no continúan hacia ámbitos externos; quien necesite
/// resolver un nombre visible desde un ámbito envolvente debe recorrer
/// la cadena de padres (ver [`Ast::lookup()`](super::Ast::lookup)).
/// La iteración sigue el orden de inserción.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: IndexMap<Identifier, NodeId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un símbolo.
    ///
    /// Un nombre ya presente nunca se reasocia: en ese caso se
    /// retorna el constructo que ya lo ocupaba.
    pub fn insert(&mut self, name: Identifier, node: NodeId) -> Result<(), NodeId> {
        match self.symbols.get(&name) {
            Some(&existing) => Err(existing),
            None => {
                self.symbols.insert(name, node);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &Identifier) -> Option<NodeId> {
        self.symbols.get(name).copied()
    }

    pub fn contains(&self, name: &Identifier) -> bool {
        self.symbols.contains_key(name)
    }

    /// Orden de inserción de un nombre.
    pub fn position(&self, name: &Identifier) -> Option<usize> {
        self.symbols.get_index_of(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, NodeId)> + '_ {
        self.symbols.iter().map(|(name, &node)| (name, node))
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.symbols.values().copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Retira una entrada para trasladarla a otro bloque.
    ///
    /// Solo las operaciones de reubicación de sentencias mueven símbolos.
    pub(super) fn take(&mut self, name: &Identifier) -> Option<NodeId> {
        self.symbols.shift_remove(name)
    }
}
