//! Árbol sintáctico abstracto.
//!
//! Todos los constructos de una unidad de compilación viven en una
//! misma arena ([`Ast`]) y se refieren entre sí por índices estables
//! ([`NodeId`]). La relación padre-hijo es de dos vías pero sin
//! ownership: el hijo guarda el índice de su padre, asignado una única
//! vez al adjuntarse, y el padre guarda los índices de sus hijos. La
//! arena es la única dueña de los nodos y se descarta como una unidad.
//!
//! El árbol no implementa recorridos ni traducciones propias; de eso
//! se encargan las pasadas en [`crate::pass`] y [`crate::lower`].

use std::num::NonZeroU32;
use thiserror::Error;

use crate::{lex::Identifier, source::Location};

mod block;
mod construct;
mod mangle;
mod scope;
mod types;

pub use construct::*;
pub use scope::SymbolTable;
pub use types::{IntegerKind, ResolveError, Resolvable, Type};

/// Referencia estable a un nodo dentro de su [`Ast`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index + 1).expect("AST arena overflow");
        NodeId(NonZeroU32::new(raw).expect("index + 1 is never zero"))
    }

    pub fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

/// Una entrada de la arena.
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    location: Option<Location>,
    construct: Construct,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn construct(&self) -> &Construct {
        &self.construct
    }
}

/// Errores de las operaciones de mutación de bloques.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AstError {
    #[error("Statement index {index} is out of bounds for a block of {len} statements")]
    OutOfBounds { index: usize, len: usize },
}

/// Arena de constructos.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

construct_accessors! {
    Module       => as_module, module, module_mut: Module;
    Function     => as_function, function, function_mut: Function;
    Extern       => as_extern, external, external_mut: Extern;
    Prototype    => as_prototype, prototype, prototype_mut: Prototype;
    ArgumentList => as_argument_list, argument_list, argument_list_mut: ArgumentList;
    Block        => as_block, block, block_mut: Block;
    Struct       => as_struct, structure, structure_mut: Struct;
    Global       => as_global, global, global_mut: Global;
    Attribute    => as_attribute, attribute, attribute_mut: Attribute;
    VariableDecl => as_variable_decl, variable_decl, variable_decl_mut: VariableDecl;
    Return       => as_return, ret, ret_mut: Return;
    ExprStatement => as_expr_statement, expr_statement, expr_statement_mut: ExprStatement;
    Literal      => as_literal, literal, literal_mut: Literal;
    Reference    => as_reference, reference, reference_mut: Reference;
    Call         => as_call, call, call_mut: Call;
    Binary       => as_binary, binary, binary_mut: Binary;
    Resolvable   => as_resolvable, resolvable, resolvable_mut: Resolvable<Type>;
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crea un nodo y le adjunta los hijos que su constructo ya enumera.
    ///
    /// El nodo resultante no tiene padre hasta que se adjunte a otro.
    pub fn alloc(&mut self, construct: Construct, location: Option<Location>) -> NodeId {
        let children = construct.children();
        let id = NodeId::from_index(self.nodes.len());

        self.nodes.push(Node {
            parent: None,
            location,
            construct,
        });

        self.adopt(id, children);
        id
    }

    /// Materializa un marcador de error como nodo.
    pub fn alloc_error(&mut self, marker: ErrorMarker, location: Option<Location>) -> NodeId {
        self.alloc(Construct::ErrorMarker(marker), location)
    }

    /// Asigna el padre de un nodo.
    ///
    /// # Panics
    /// Si el nodo ya tenía padre o si se intenta adjuntar a sí mismo.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) {
        assert_ne!(child, parent, "construct cannot be its own parent");

        let node = &mut self.nodes[child.index()];
        if let Some(previous) = node.parent {
            panic!(
                "{} {:?} is already attached to {:?}",
                node.construct.kind(),
                child,
                previous
            );
        }

        node.parent = Some(parent);
    }

    /// Adjunta varios hijos a un mismo padre.
    pub fn adopt<I>(&mut self, parent: NodeId, children: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        for child in children {
            self.attach(child, parent);
        }
    }

    /// Cambia el bloque que contiene a una sentencia reubicada.
    ///
    /// Esta es la única ruta por la que un enlace de padre se reasigna.
    pub(crate) fn rehome(&mut self, statement: NodeId, block: NodeId) {
        self.nodes[statement.index()].parent = Some(block);
    }

    /// Fija la ubicación de un nodo creado antes de conocer su extensión.
    pub(crate) fn set_location(&mut self, id: NodeId, location: Location) {
        self.nodes[id.index()].location = Some(location);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> &Construct {
        &self.node(id).construct
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Construct {
        &mut self.nodes[id.index()].construct
    }

    pub fn kind(&self, id: NodeId) -> ConstructKind {
        self.get(id).kind()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn location(&self, id: NodeId) -> Option<&Location> {
        self.node(id).location()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).children()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// El nodo y todos sus ancestros, del más cercano al más lejano.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&id| self.parent(id))
    }

    /// Módulo que contiene a un nodo, o el nodo mismo si es un módulo.
    pub fn module_of(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|&id| self.kind(id) == ConstructKind::Module)
    }

    /// Agrega una declaración de nivel superior a un módulo.
    ///
    /// Si el nombre ya estaba registrado no se agrega nada y se retorna
    /// el constructo existente.
    pub fn add_item(&mut self, module: NodeId, name: Identifier, item: NodeId) -> Result<(), NodeId> {
        self.module_mut(module).scope.insert(name, item)?;
        self.module_mut(module).items.push(item);
        self.attach(item, module);

        Ok(())
    }

    /// Busca un nombre visible desde `from`.
    ///
    /// Se consultan, en orden, los bloques envolventes, los argumentos
    /// de la función envolvente y finalmente el ámbito del módulo. En un
    /// bloque solo son visibles las declaraciones que preceden a la
    /// sentencia que contiene a `from`, así que una declaración no se ve
    /// a sí misma ni a las posteriores.
    pub fn lookup(&self, from: NodeId, name: &Identifier) -> Option<NodeId> {
        let mut inner = from;
        for scope in self.ancestors(from) {
            let found = match self.get(scope) {
                Construct::Block(block) => block
                    .scope
                    .lookup(name)
                    .filter(|&decl| scope == from || self.precedes(scope, decl, inner)),

                Construct::Function(function) => {
                    let prototype = self.prototype(function.prototype);
                    self.argument_list(prototype.arguments).scope.lookup(name)
                }

                Construct::Module(module) => module.scope.lookup(name),
                _ => None,
            };

            if found.is_some() {
                return found;
            }

            inner = scope;
        }

        None
    }

    /// Tipo de una declaración de variable.
    pub fn declared_type(&self, decl: NodeId) -> Result<Type, ResolveError> {
        match self.variable_decl(decl).ty {
            DeclaredType::Explicit(ty) => self.resolvable(ty).resolve(self, decl),
            DeclaredType::Inferred => self.type_of(self.variable_decl(decl).value),
        }
    }

    /// Tipo de una expresión.
    pub fn type_of(&self, expr: NodeId) -> Result<Type, ResolveError> {
        match self.get(expr) {
            Construct::Literal(literal) => Ok(literal.ty()),

            Construct::Binary(binary) if binary.operator.is_comparison() => Ok(Type::Bool),
            Construct::Binary(binary) => self.type_of(binary.lhs),

            Construct::Reference(Reference { name }) => {
                let target = self
                    .lookup(expr, name)
                    .ok_or_else(|| ResolveError::Undefined(name.clone()))?;

                match self.get(target) {
                    Construct::VariableDecl(_) => self.declared_type(target),
                    Construct::Global(global) => self.resolvable(global.ty).resolve(self, target),
                    Construct::Resolvable(argument) => argument.resolve(self, target),
                    _ => Err(ResolveError::NotAValue(name.clone())),
                }
            }

            Construct::Call(call) => {
                let prototype = self.callee_prototype(expr, &call.callee)?;
                let return_type = self.prototype(prototype).return_type;

                self.resolvable(return_type).resolve(self, prototype)
            }

            other => panic!("{} is not an expression", other.kind()),
        }
    }

    /// Prototipo de la función o extern que nombra `callee`.
    pub fn callee_prototype(&self, from: NodeId, callee: &Identifier) -> Result<NodeId, ResolveError> {
        let target = self
            .module_of(from)
            .and_then(|module| self.module(module).scope.lookup(callee))
            .ok_or_else(|| ResolveError::Undefined(callee.clone()))?;

        match self.get(target) {
            Construct::Function(function) => Ok(function.prototype),
            Construct::Extern(external) => Ok(external.prototype),
            _ => Err(ResolveError::NotAFunction(callee.clone())),
        }
    }

    /// Nombre de un ítem de nivel superior.
    pub fn item_name(&self, item: NodeId) -> Option<&Identifier> {
        match self.get(item) {
            Construct::Function(function) => Some(&self.prototype(function.prototype).name),
            Construct::Extern(external) => Some(&self.prototype(external.prototype).name),
            other => other.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_type(ast: &mut Ast) -> NodeId {
        ast.alloc(
            Construct::Resolvable(Resolvable::Resolved(Type::Integer(IntegerKind::I32))),
            None,
        )
    }

    fn empty_module(ast: &mut Ast, name: &str) -> NodeId {
        ast.alloc(
            Construct::Module(Module {
                name: name.into(),
                items: Vec::new(),
                scope: SymbolTable::new(),
            }),
            None,
        )
    }

    #[test]
    fn alloc_attaches_listed_children() {
        let mut ast = Ast::new();
        let ty = i32_type(&mut ast);
        let value = ast.alloc(
            Construct::Literal(Literal::Integer {
                value: 5,
                kind: IntegerKind::I32,
            }),
            None,
        );

        let global = ast.alloc(
            Construct::Global(Global {
                name: "x".into(),
                ty,
                value: Some(value),
            }),
            None,
        );

        assert_eq!(ast.parent(ty), Some(global));
        assert_eq!(ast.parent(value), Some(global));
        assert_eq!(ast.children(global), vec![ty, value]);
        assert_eq!(ast.parent(global), None);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn attaching_twice_is_fatal() {
        let mut ast = Ast::new();
        let ty = i32_type(&mut ast);
        let first = empty_module(&mut ast, "a");
        let second = empty_module(&mut ast, "b");

        ast.attach(ty, first);
        ast.attach(ty, second);
    }

    #[test]
    fn adopt_attaches_every_child() {
        let mut ast = Ast::new();
        let block = ast.alloc(Construct::Block(Block::default()), None);
        let types = [i32_type(&mut ast), i32_type(&mut ast)];

        ast.adopt(block, types);
        assert!(types.iter().all(|&ty| ast.parent(ty) == Some(block)));
        assert_eq!(ast.parent(block), None);
    }

    #[test]
    fn lookup_walks_enclosing_scopes() {
        let mut ast = Ast::new();
        let module = empty_module(&mut ast, "m");

        let ty = i32_type(&mut ast);
        let global = ast.alloc(
            Construct::Global(Global {
                name: "g".into(),
                ty,
                value: None,
            }),
            None,
        );

        ast.add_item(module, "g".into(), global).unwrap();

        let inner = ast.alloc(Construct::Block(Block::default()), None);
        let reference = ast.alloc(Construct::Reference(Reference { name: "g".into() }), None);
        let statement = ast.alloc(
            Construct::ExprStatement(ExprStatement {
                expression: reference,
            }),
            None,
        );

        ast.append_statement(inner, statement).unwrap();
        ast.attach(inner, module);

        assert_eq!(ast.lookup(reference, &"G".into()), Some(global));
        assert_eq!(ast.lookup(reference, &"h".into()), None);
        assert_eq!(ast.module_of(reference), Some(module));
        assert_eq!(
            ast.type_of(reference),
            Ok(Type::Integer(IntegerKind::I32))
        );
    }

    #[test]
    fn duplicate_items_are_rejected() {
        let mut ast = Ast::new();
        let module = empty_module(&mut ast, "m");

        let first = ast.alloc(Construct::Attribute(Attribute { name: "a".into() }), None);
        let second = ast.alloc(Construct::Attribute(Attribute { name: "a".into() }), None);

        assert_eq!(ast.add_item(module, "a".into(), first), Ok(()));
        assert_eq!(ast.add_item(module, "a".into(), second), Err(first));
        assert_eq!(ast.module(module).items, vec![first]);
        assert_eq!(ast.parent(second), None);
    }
}
