//! Nombres decorados de prototipos.

use super::{Ast, Construct, ConstructKind, NodeId};

const SEPARATOR: &str = "_";

impl Ast {
    /// Nombre externo determinista de un prototipo.
    ///
    /// Tiene la forma `módulo_retorno_nombre`, seguida de `_tipo_argumento`
    /// por cada entrada de tipo en la lista de argumentos, en orden de
    /// declaración. Solo existe si el padre inmediato del prototipo es una
    /// función o un extern; en cualquier otro caso se retorna `None`.
    pub fn mangled_name(&self, prototype: NodeId) -> Option<String> {
        let owner = self.parent(prototype)?;
        match self.kind(owner) {
            ConstructKind::Function | ConstructKind::Extern => (),
            _ => return None,
        }

        let module = self.module_of(owner)?;
        let proto = self.prototype(prototype);
        let return_type = self.resolvable(proto.return_type);

        let mut mangled = [
            self.module(module).name.to_string(),
            return_type.name_or_id(),
            proto.name.to_string(),
        ]
        .join(SEPARATOR);

        for (name, node) in self.argument_list(proto.arguments).scope.iter() {
            if let Construct::Resolvable(argument_type) = self.get(node) {
                mangled.push_str(SEPARATOR);
                mangled.push_str(&argument_type.name_or_id());
                mangled.push_str(SEPARATOR);
                mangled.push_str(name.as_ref());
            }
        }

        Some(mangled)
    }
}
