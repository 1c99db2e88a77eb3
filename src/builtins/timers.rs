//! Timer globals backed by the host's [`crate::TimerService`]. The
//! interpreter only records callbacks; the host fires them via
//! [`crate::Interp::fire_timer`].

use crate::builtins::{js_invalid_args, register_fn};
use crate::core::eval::Ev;
use crate::core::value::{ObjRef, UNDEF};
use crate::core::{Interp, TimerEvent};

pub(crate) fn register(interp: &mut Interp) {
    let env = interp.global_env;
    register_fn(interp, env, "setTimeout", |i, t, a| set_timer(i, t, a, false));
    register_fn(interp, env, "setInterval", |i, t, a| set_timer(i, t, a, true));
    register_fn(interp, env, "clearTimeout", do_clear_timer);
    register_fn(interp, env, "clearInterval", do_clear_timer);
    register_fn(interp, env, "getTime", do_get_time);
}

fn set_timer(interp: &mut Interp, this: ObjRef, argv: &[ObjRef], periodic: bool) -> Ev {
    if argv.len() != 3 {
        return Err(js_invalid_args(interp));
    }
    let func = argv[1];
    let ms = interp.heap.get_int(argv[2]).max(0) as u64;

    let Some(timers) = interp.timers.as_mut() else {
        return Err(js_invalid_args(interp));
    };
    let id = timers.set(ms, periodic);

    interp.heap.get(func);
    interp.heap.get(this);
    interp.timer_events.insert(id, TimerEvent { func, this, periodic });
    Ok(ObjRef::Int(id))
}

/// Cancel one timer, or every pending timer when called bare.
fn do_clear_timer(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    match argv.get(1) {
        Some(&id) => {
            let id = interp.heap.get_int(id);
            interp.drop_timer(id, true);
        }
        None => interp.drop_all_timers(),
    }
    Ok(UNDEF)
}

/// Seconds since the host's clock origin, as a double.
fn do_get_time(interp: &mut Interp, _this: ObjRef, argv: &[ObjRef]) -> Ev {
    if argv.len() != 1 {
        return Err(js_invalid_args(interp));
    }
    let Some(timers) = interp.timers.as_ref() else {
        return Err(js_invalid_args(interp));
    };
    let secs = timers.ticks_ms() as f64 / 1000.0;
    Ok(interp.heap.new_fp(secs))
}
