//! Emisión de listados de IR.
//!
//! El listado es determinista: estructuras, globales y luego funciones,
//! cada grupo en el orden en que se registró en el [`Module`]. Las
//! funciones sin cuerpo se declaran y las demás se definen con sus
//! instrucciones numeradas.

use crate::ir::{Function, FunctionBody, Instruction, Module, Value};
use std::{
    fmt::{self, Display},
    io::{self, Write},
};

macro_rules! emit {
    ($output:expr, $index:expr, $($format:tt)*) => {{
        write!($output, "\t{:>3}: ", $index)?;
        writeln!($output, $($format)*)
    }};
}

pub fn emit<W: Write>(module: &Module, output: &mut W) -> io::Result<()> {
    writeln!(output, "; module {}", module.name)?;

    for structure in &module.structs {
        let fields: Vec<_> = structure
            .fields
            .iter()
            .map(|(name, ty)| format!("{} {}", ty, name))
            .collect();

        writeln!(output, "%{} = type {{ {} }}", structure.name, fields.join(", "))?;
    }

    for global in &module.globals {
        match &global.init {
            Some(init) => writeln!(output, "@{} = global {}", global.name, init)?,
            None => writeln!(output, "@{} = global {} zeroed", global.name, global.ty)?,
        }
    }

    for function in &module.functions {
        emit_function(module, function, output)?;
    }

    Ok(())
}

fn emit_function<W: Write>(module: &Module, function: &Function, output: &mut W) -> io::Result<()> {
    let signature = &function.signature;

    let mut parameters: Vec<_> = signature
        .parameters
        .iter()
        .enumerate()
        .map(|(index, ty)| format!("{} %{}", ty, index))
        .collect();

    if signature.variadic {
        parameters.push(String::from("..."));
    }

    let parameters = parameters.join(", ");
    let body = match &function.body {
        FunctionBody::Generated(body) => body,
        FunctionBody::External => {
            return writeln!(
                output,
                "declare {} @{}({})",
                signature.return_type, function.name, parameters
            );
        }
    };

    writeln!(
        output,
        "define {} @{}({}) {{",
        signature.return_type, function.name, parameters
    )?;

    for (index, instruction) in body.iter().enumerate() {
        let operand = |value| Operand(module, value);

        match instruction {
            Instruction::Move(value, output_local) => {
                emit!(output, index, "{} = move {}", output_local, operand(*value))?
            }

            Instruction::LoadGlobal(global, local) => {
                emit!(output, index, "{} = load @{}", local, global)?
            }

            Instruction::Binary {
                operator,
                lhs,
                rhs,
                output: local,
            } => emit!(
                output,
                index,
                "{} = {} {}, {}",
                local,
                operator,
                operand(*lhs),
                operand(*rhs)
            )?,

            Instruction::Call {
                target,
                arguments,
                output: local,
            } => {
                let arguments: Vec<_> = arguments
                    .iter()
                    .map(|&argument| operand(argument).to_string())
                    .collect();

                let callee = operand(Value::Function(*target));
                match local {
                    Some(local) => {
                        emit!(output, index, "{} = call {}({})", local, callee, arguments.join(", "))?
                    }

                    None => emit!(output, index, "call {}({})", callee, arguments.join(", "))?,
                }
            }

            Instruction::Return(Some(value)) => emit!(output, index, "ret {}", operand(*value))?,
            Instruction::Return(None) => emit!(output, index, "ret void")?,
        }
    }

    writeln!(output, "}}")
}

/// Un valor presentado en el contexto de su módulo.
struct Operand<'a>(&'a Module, Value);

impl Display for Operand<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Operand(module, value) = self;
        match value {
            Value::Local(local) => local.fmt(fmt),
            Value::Constant(constant) => constant.fmt(fmt),
            Value::Function(handle) => match module.functions.get(handle.0 as usize) {
                Some(function) => write!(fmt, "@{}", function.name),
                None => write!(fmt, "@<fn {}>", handle.0),
            },

            Value::Void => fmt.write_str("void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::Ast,
        lex,
        lower::lower_module,
        notice::NoticeStack,
        parse::parse_module,
    };

    fn listing(text: &str) -> String {
        let tokens = lex::tokenize(text, "<test>").unwrap();
        let mut ast = Ast::new();
        let mut notices = NoticeStack::new();
        let module = parse_module(&tokens, &mut ast, &mut notices).unwrap();

        let mut target = Module::default();
        lower_module(&ast, module, &mut target).unwrap();

        let mut output = Vec::new();
        emit(&target, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn listing_orders_sections() {
        let text = listing(
            "module demo {
                 extern fn print(i32 value, ...);
                 fn main() -> i32 { let n = limit - 1; print(n, 'x'); return n < 3; }
                 global i32 limit = 7;
                 global bool flag;
                 struct Pair { i8 a; bool b; }
             }",
        );

        let expected = "\
; module demo
%Pair = type { i8 a, bool b }
@limit = global i32 7
@flag = global bool zeroed
declare void @print(i32 %0, ...)
define i32 @main() {
\t  0: %0 = load @limit
\t  1: %1 = sub %0, i32 1
\t  2: %2 = move %1
\t  3: call @print(%2, char 'x')
\t  4: %3 = lt %2, i32 3
\t  5: ret %3
}
";

        assert_eq!(text, expected);
    }

    #[test]
    fn implicit_returns_are_listed() {
        let text = listing("module m { fn idle() { } }");
        assert_eq!(text, "; module m\ndefine void @idle() {\n\t  0: ret void\n}\n");
    }
}
