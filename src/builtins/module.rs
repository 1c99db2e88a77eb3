//! `require()`: load-once module evaluation through the host's
//! [`crate::ModuleLoader`].

use crate::builtins::{js_invalid_args, register_fn};
use crate::core::eval::Ev;
use crate::core::scan::Source;
use crate::core::value::ObjRef;
use crate::core::Interp;

pub(crate) fn register(interp: &mut Interp) {
    let env = interp.global_env;
    register_fn(interp, env, "require", do_require);
}

fn do_require(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 2 {
        return Err(js_invalid_args(interp));
    }
    let name = interp.heap.get_str(argv[1]).to_string();

    if let Some(&exports) = interp.modules.get(&name) {
        return Ok(interp.heap.get(exports));
    }

    let bytes = interp
        .loader
        .as_mut()
        .and_then(|l| l.load(&name))
        .ok_or_else(|| interp.throw_str("Exception: Module not found"))?;

    log::debug!("loading module {name}");
    let exports = interp.eval_module_source(&Source::new(bytes))?;
    interp.heap.get(exports);
    interp.modules.insert(name, exports);
    Ok(exports)
}
