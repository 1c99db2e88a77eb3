//! Free-standing globals: `eval`, numeric helpers and the `debug`
//! introspection object.

use crate::builtins::{js_invalid_args, register_fn};
use crate::core::eval::Ev;
use crate::core::number::Num;
use crate::core::value::{Class, ObjRef, FALSE, TRUE, UNDEF};
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp) {
    let env = interp.global_env;
    register_fn(interp, env, "eval", do_eval);
    register_fn(interp, env, "toInteger", do_to_integer);
    register_fn(interp, env, "isNaN", do_is_nan);

    let debug = interp.heap.new_object();
    register_fn(interp, debug, "dumpEnv", do_dump_env);
    register_fn(interp, debug, "describe", do_describe);
    register_fn(interp, debug, "meminfo", do_meminfo);
    interp.heap.set_property(env, "debug", debug);
}

/// Strings are evaluated as script in a child scope; anything else
/// passes through untouched.
fn do_eval(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() == 1 {
        return Ok(UNDEF);
    }
    interp.eval_value(argv[1])
}

fn do_to_integer(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let n = interp.heap.cast(argv[1], Class::Num);
    let num = interp.heap.num_value(n);
    interp.heap.put(n);
    match num {
        Some(Num::Int(i)) => Ok(ObjRef::Int(i)),
        Some(Num::Fp(f)) if f.is_nan() => Ok(ObjRef::Int(0)),
        Some(Num::Fp(f)) => Ok(ObjRef::Int(f.trunc() as i32)),
        None => Ok(ObjRef::Int(0)),
    }
}

fn do_is_nan(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let n = interp.heap.cast(argv[1], Class::Num);
    let nan = interp.heap.num_value(n).is_none_or(Num::is_nan);
    interp.heap.put(n);
    Ok(if nan { TRUE } else { FALSE })
}

fn do_dump_env(interp: &mut Interp, _this: ObjRef, _argv: &[ObjRef]) -> Ev {
    let env = interp.global_env;
    log::info!("global environment: {}", interp.heap.format_value(env));
    Ok(UNDEF)
}

fn do_describe(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    log::info!("{}", interp.heap.format_value(argv[1]));
    Ok(UNDEF)
}

fn do_meminfo(interp: &mut Interp, _this: ObjRef, _argv: &[ObjRef]) -> Ev {
    log::info!(
        "heap: {} bytes in blocks, {} live slots",
        interp.heap.alloc.used(),
        interp.heap.live_count()
    );
    Ok(UNDEF)
}
