//! Operaciones sobre bloques.
//!
//! Son las únicas mutaciones de forma que el árbol admite luego de
//! construirse: agregar, dividir y reubicar sentencias.

use super::{Ast, AstError, Block, Construct, ConstructKind, NodeId};

impl Ast {
    /// Agrega una sentencia al final de un bloque.
    ///
    /// Las declaraciones de variables se registran en la tabla de símbolos
    /// del bloque. Si el nombre ya estaba declarado en este mismo bloque, la
    /// sentencia no se agrega y se retorna la declaración previa.
    pub fn append_statement(&mut self, block: NodeId, statement: NodeId) -> Result<(), NodeId> {
        if let Construct::VariableDecl(decl) = self.get(statement) {
            let name = decl.name.clone();
            self.block_mut(block).scope.insert(name, statement)?;
        }

        self.block_mut(block).statements.push(statement);
        self.attach(statement, block);

        Ok(())
    }

    /// Divide un bloque en dos a partir de la sentencia en `at`.
    ///
    /// Las sentencias desde `at` en adelante pasan, en el mismo orden, a
    /// un bloque nuevo con el mismo padre que el original. Si el bloque
    /// está vacío el índice no se considera y el bloque nuevo queda vacío.
    pub fn split(&mut self, block: NodeId, at: usize) -> Result<NodeId, AstError> {
        let len = self.block(block).statements.len();
        if len > 0 && at >= len {
            return Err(AstError::OutOfBounds { index: at, len });
        }

        let location = self.location(block).cloned();
        let new_block = self.alloc(Construct::Block(Block::default()), location);
        if let Some(parent) = self.parent(block) {
            self.attach(new_block, parent);
        }

        if len > 0 {
            self.relocate_statements(block, new_block, at);
        }

        Ok(new_block)
    }

    /// Mueve las sentencias de `from` a partir de `start` al final de `to`.
    ///
    /// Retorna la cantidad de sentencias movidas.
    pub fn relocate_statements(&mut self, from: NodeId, to: NodeId, start: usize) -> usize {
        let moved = {
            let statements = &mut self.block_mut(from).statements;
            if start >= statements.len() {
                return 0;
            }

            statements.split_off(start)
        };

        for &statement in &moved {
            // Una declaración se lleva su símbolo; el bloque destino
            // conserva el suyo si ya tenía uno con el mismo nombre
            if let Some(name) = self.variable_name(statement) {
                let source = &mut self.block_mut(from).scope;
                if source.lookup(&name) == Some(statement) {
                    source.take(&name);
                }

                let _ = self.block_mut(to).scope.insert(name, statement);
            }

            self.rehome(statement, to);
        }

        let count = moved.len();
        self.block_mut(to).statements.extend(moved);

        count
    }

    /// Posición de una sentencia dentro de un bloque.
    pub fn locate(&self, block: NodeId, statement: NodeId) -> Option<usize> {
        self.block(block)
            .statements
            .iter()
            .position(|&candidate| candidate == statement)
    }

    /// Determina si `statement` aparece en `block` antes que `later`.
    pub fn precedes(&self, block: NodeId, statement: NodeId, later: NodeId) -> bool {
        match (self.locate(block, statement), self.locate(block, later)) {
            (Some(first), Some(second)) => first < second,
            _ => false,
        }
    }

    /// Determina si una sentencia termina el flujo de su bloque.
    pub fn is_terminal(&self, statement: NodeId) -> bool {
        self.kind(statement) == ConstructKind::Return
    }

    /// Sentencias terminales del bloque, en orden.
    pub fn find_terminals(&self, block: NodeId) -> Vec<NodeId> {
        self.block(block)
            .statements
            .iter()
            .copied()
            .filter(|&statement| self.is_terminal(statement))
            .collect()
    }

    pub fn first_statement(&self, block: NodeId) -> Option<NodeId> {
        self.block(block).statements.first().copied()
    }

    pub fn last_statement(&self, block: NodeId) -> Option<NodeId> {
        self.block(block).statements.last().copied()
    }

    /// Determina si el bloque es el cuerpo de una función.
    ///
    /// # Panics
    /// Si el bloque no está adjunto a ningún padre.
    pub fn is_function_body(&self, block: NodeId) -> bool {
        let parent = self
            .parent(block)
            .unwrap_or_else(|| panic!("block {:?} has no parent construct", block));

        self.kind(parent) == ConstructKind::Function
    }

    /// Función más cercana que contiene al bloque, a través de bloques anidados.
    pub fn find_parent_function(&self, block: NodeId) -> Option<NodeId> {
        self.ancestors(block)
            .skip(1)
            .take_while(|&id| self.kind(id) != ConstructKind::Module)
            .find(|&id| self.kind(id) == ConstructKind::Function)
    }

    fn variable_name(&self, statement: NodeId) -> Option<crate::lex::Identifier> {
        match self.get(statement) {
            Construct::VariableDecl(decl) => Some(decl.name.clone()),
            _ => None,
        }
    }
}
