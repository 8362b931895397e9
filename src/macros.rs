/// Genera accesores por variante de [`Construct`](crate::ast::Construct).
///
/// Para cada variante se obtiene `Construct::as_x()` (fallible) y
/// `Ast::x()` / `Ast::x_mut()`, que asumen el tipo correcto y fallan
/// de manera fatal si no lo es: leer campos de otra clase de constructo
/// es un error de implementación, no del programa fuente.
macro_rules! construct_accessors {
    ($($variant:ident => $as:ident, $get:ident, $get_mut:ident: $type:ty;)*) => {
        impl Construct {
            $(
                pub fn $as(&self) -> Option<&$type> {
                    match self {
                        Construct::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }

        impl Ast {
            $(
                pub fn $get(&self, id: NodeId) -> &$type {
                    match self.get(id) {
                        Construct::$variant(inner) => inner,
                        other => panic!(
                            "expected {} construct at {:?}, found {}",
                            stringify!($variant),
                            id,
                            other.kind()
                        ),
                    }
                }

                #[allow(dead_code)]
                pub(crate) fn $get_mut(&mut self, id: NodeId) -> &mut $type {
                    match self.get_mut(id) {
                        Construct::$variant(inner) => inner,
                        other => panic!(
                            "expected {} construct at {:?}, found {}",
                            stringify!($variant),
                            id,
                            other.kind()
                        ),
                    }
                }
            )*
        }
    };
}
