//! `Function` constructor and prototype.

use crate::builtins::{register_constructor, register_fn};
use crate::core::eval::Ev;
use crate::core::scan::{Scanner, Source, Tok};
use crate::core::value::{FuncCode, ObjRef, UNDEF};
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp, proto: ObjRef) {
    register_fn(interp, proto, "call", do_call);
    register_constructor(interp, "Function", do_function_constructor, proto);
}

/// `f.call(thisArg, args...)`: invoke `this` with an explicit receiver.
fn do_call(interp: &mut Interp, this: ObjRef, argv: &[ObjRef]) -> Ev {
    let target_this = argv.get(1).copied().unwrap_or(UNDEF);
    let mut call_argv = vec![this];
    call_argv.extend_from_slice(argv.get(2..).unwrap_or(&[]));
    interp.call_function(target_this, &call_argv)
}

fn do_null_function(_interp: &mut Interp, _this: ObjRef, _argv: &[ObjRef]) -> Ev {
    Ok(UNDEF)
}

/// Compile a function from strings: the leading arguments name the
/// parameters, the last is the body. Closes over the global scope.
fn do_function_constructor(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() == 1 {
        return Ok(interp.heap.new_function(
            vec!["".into()],
            FuncCode::Native(do_null_function),
            UNDEF,
        ));
    }

    let mut params = vec!["__builtin_func__".into()];
    let param_texts: Vec<String> = argv[1..argv.len() - 1]
        .iter()
        .map(|&a| interp.heap.get_str(a).to_string())
        .collect();
    if !param_texts.is_empty() {
        let joined = param_texts.join(", ");
        let mut scan = Scanner::new(Source::from(&*joined), None);
        if scan.tok() == Tok::ID {
            interp.parse_param_list(&mut scan, &mut params)?;
        }
    }

    let body_text = interp.heap.get_str(argv[argv.len() - 1]);
    let body = Scanner::new(Source::from(&*body_text), interp.constants.clone());

    let scope = interp.global_env;
    Ok(interp
        .heap
        .new_function(params, FuncCode::Scripted(Box::new(body)), scope))
}
