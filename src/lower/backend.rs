use crate::ir::{Function, FunctionBody, FunctionRef, Module, Signature};

/// Destino del lowering.
///
/// La pasada no conoce más del backend que estas operaciones. Los nombres
/// se comparan sin distinguir mayúsculas, igual que los identificadores.
pub trait Backend {
    /// Busca una función ya registrada.
    fn lookup_function(&self, name: &str) -> Option<FunctionRef>;

    /// Retorna la función con este nombre, registrándola como externa
    /// con `signature` si todavía no existía.
    fn get_or_insert_function(&mut self, name: &str, signature: Signature) -> FunctionRef;

    fn function(&self, handle: FunctionRef) -> &Function;

    fn function_mut(&mut self, handle: FunctionRef) -> &mut Function;

    /// Módulo de IR que se está construyendo.
    fn target(&mut self) -> &mut Module;
}

impl Backend for Module {
    fn lookup_function(&self, name: &str) -> Option<FunctionRef> {
        self.functions
            .iter()
            .position(|function| unicase::eq_ascii(function.name.as_str(), name))
            .map(|index| FunctionRef(index as u32))
    }

    fn get_or_insert_function(&mut self, name: &str, signature: Signature) -> FunctionRef {
        if let Some(handle) = self.lookup_function(name) {
            return handle;
        }

        let handle = FunctionRef(self.functions.len() as u32);
        self.functions.push(Function {
            name: name.to_owned(),
            signature,
            body: FunctionBody::External,
        });

        handle
    }

    fn function(&self, FunctionRef(index): FunctionRef) -> &Function {
        &self.functions[index as usize]
    }

    fn function_mut(&mut self, FunctionRef(index): FunctionRef) -> &mut Function {
        &mut self.functions[index as usize]
    }

    fn target(&mut self) -> &mut Module {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;

    fn signature(parameters: usize) -> Signature {
        Signature {
            parameters: vec![Type::Int(32); parameters],
            variadic: false,
            return_type: Type::Void,
        }
    }

    #[test]
    fn insertion_is_idempotent_per_name() {
        let mut module = Module::new("m");

        let first = module.get_or_insert_function("puts", signature(1));
        let again = module.get_or_insert_function("PUTS", signature(3));

        assert_eq!(first, again);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.function(first).signature, signature(1));
        assert!(!module.function(first).has_body());
    }

    #[test]
    fn lookup_misses_unknown_names() {
        let mut module = Module::new("m");
        module.get_or_insert_function("a", signature(0));
        let b = module.get_or_insert_function("b", signature(2));

        assert_eq!(module.lookup_function("B"), Some(b));
        assert_eq!(module.lookup_function("c"), None);

        module.function_mut(b).body = FunctionBody::Generated(Vec::new());
        assert!(module.target().function(b).has_body());
    }
}
