//! Interpreter context: the heap, the environment chain, and the
//! host-facing entry points. All evaluator state that the original
//! design kept global lives here, threaded explicitly.

pub(crate) mod eval;
pub(crate) mod gc;
pub(crate) mod number;
pub(crate) mod scan;
pub(crate) mod value;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::core::eval::{Ev, Signal};
use crate::core::scan::{ConstantsResolver, Scanner, Source};
use crate::core::value::{Heap, ObjRef, UNDEF};
use crate::error::JsError;

/// Heap and evaluator limits. The defaults suit tests and small hosts;
/// embedded deployments tune them down.
#[derive(Clone)]
pub struct InterpConfig {
    /// Byte budget for heap blocks; exhaustion after a squeeze pass is
    /// fatal.
    pub mem_limit: usize,
    /// Slots per slab block.
    pub block_capacity: usize,
    /// Most arguments a single call may evaluate; exceeding it throws.
    pub max_call_args: usize,
}

impl Default for InterpConfig {
    fn default() -> Self {
        InterpConfig {
            mem_limit: 256 * 1024,
            block_capacity: 64,
            max_call_args: 16,
        }
    }
}

/// Host timer wiring. The interpreter never owns a clock: `setTimeout`
/// registers with the service, the host's event loop calls
/// [`Interp::fire_timer`] when the deadline passes.
pub trait TimerService {
    /// Schedule a timer, returning its id.
    fn set(&mut self, delay_ms: u64, periodic: bool) -> i32;
    fn cancel(&mut self, id: i32);
    /// Milliseconds since the host booted (or any fixed origin).
    fn ticks_ms(&self) -> u64;
}

/// Resolves `require()` names to script source.
pub trait ModuleLoader {
    fn load(&mut self, name: &str) -> Option<Vec<u8>>;
}

pub(crate) struct TimerEvent {
    pub(crate) func: ObjRef,
    pub(crate) this: ObjRef,
    pub(crate) periodic: bool,
}

pub struct Interp {
    pub heap: Heap,
    pub(crate) global_env: ObjRef,
    /// Innermost scope; an uncounted alias of an env that is rooted
    /// through the call chain.
    pub(crate) cur_env: ObjRef,
    pub(crate) this_obj: ObjRef,
    /// Argument vector of the executing call, function object first.
    /// Empty outside any call, which is what `arguments` checks.
    pub(crate) cur_args: Vec<ObjRef>,
    pub(crate) max_call_args: usize,
    pub(crate) constants: Option<ConstantsResolver>,
    pub(crate) loader: Option<Box<dyn ModuleLoader>>,
    pub(crate) timers: Option<Box<dyn TimerService>>,
    /// Module name -> cached exports (counted), insertion ordered.
    pub(crate) modules: IndexMap<String, ObjRef>,
    /// Live timer callbacks (func/this counted), keyed by timer id.
    pub(crate) timer_events: IndexMap<i32, TimerEvent>,
    stop: Arc<AtomicBool>,
}

impl Interp {
    pub fn new(config: InterpConfig) -> Self {
        let mut heap = Heap::new(config.mem_limit, config.block_capacity);
        let global_env = heap.new_env(None);
        let mut interp = Interp {
            heap,
            global_env,
            cur_env: global_env,
            this_obj: global_env,
            cur_args: Vec::new(),
            max_call_args: config.max_call_args,
            constants: None,
            loader: None,
            timers: None,
            modules: IndexMap::new(),
            timer_events: IndexMap::new(),
            stop: Arc::new(AtomicBool::new(false)),
        };
        crate::builtins::register(&mut interp);
        interp
    }

    pub fn global_env(&self) -> ObjRef {
        self.global_env
    }

    /// Bind a value in the global environment. Takes ownership of
    /// `value`'s reference.
    pub fn set_global(&mut self, name: &str, value: ObjRef) {
        let env = self.global_env;
        self.heap.set_property(env, name, value);
    }

    /// Expose a native function to scripts under `name`.
    pub fn set_global_fn(&mut self, name: &str, f: crate::core::value::NativeFn) {
        let func = self
            .heap
            .new_function(vec![name.into()], crate::core::value::FuncCode::Native(f), UNDEF);
        let env = self.global_env;
        self.heap.set_property(env, name, func);
    }

    pub fn set_constants_resolver(&mut self, resolver: ConstantsResolver) {
        self.constants = Some(resolver);
    }

    pub fn set_module_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loader = Some(loader);
    }

    pub fn set_timer_service(&mut self, timers: Box<dyn TimerService>) {
        self.timers = Some(timers);
    }

    /// Shared cancellation flag; setting it makes running loops wind
    /// down at their next iteration boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /*** Entry points ***/

    pub fn eval(&mut self, code: &str) -> Result<ObjRef, JsError> {
        self.eval_source(&Source::from(code))
    }

    /// Evaluate a top-level statement list in the global scope. The
    /// returned value is acquired; release it with `heap.put` when done.
    pub fn eval_source(&mut self, src: &Source) -> Result<ObjRef, JsError> {
        self.stop.store(false, Ordering::Relaxed);
        let mut scan = Scanner::new(src.clone(), self.constants.clone());
        let rc = self.eval_statement_list(&mut scan);
        self.finish(rc)
    }

    /// Evaluate module source: a child scope with `module` and
    /// `module.exports` bound; yields the exports object.
    pub fn eval_module(&mut self, code: &str) -> Result<ObjRef, JsError> {
        let rc = self.eval_module_source(&Source::from(code));
        self.finish(rc)
    }

    /// Host-side `require()`: load and cache a module, with a loader
    /// miss surfaced as a typed error rather than a script exception.
    pub fn require(&mut self, name: &str) -> Result<ObjRef, JsError> {
        if let Some(&exports) = self.modules.get(name) {
            return Ok(self.heap.get(exports));
        }
        let Some(bytes) = self.loader.as_mut().and_then(|l| l.load(name)) else {
            return Err(JsError::ModuleNotFound(name.to_string()));
        };
        let rc = self.eval_module_source(&Source::new(bytes));
        let exports = self.finish(rc)?;
        self.heap.get(exports);
        self.modules.insert(name.to_string(), exports);
        Ok(exports)
    }

    pub(crate) fn eval_module_source(&mut self, src: &Source) -> Ev {
        let saved_env = self.cur_env;
        let env = self.heap.new_env(Some(self.global_env));
        self.cur_env = env;

        let module = self.heap.new_object();
        let exports = self.heap.new_object();
        self.heap.get(exports);
        self.heap.set_property(module, "exports", exports);
        self.heap.set_property(env, "module", module);

        let mut scan = Scanner::new(src.clone(), self.constants.clone());
        let rc = self.eval_statement_list(&mut scan);

        self.heap.put(env);
        self.cur_env = saved_env;

        match rc {
            Ok(v) | Err(Signal::Return(v)) => {
                self.heap.put(v);
                Ok(exports)
            }
            Err(Signal::Break | Signal::Continue) => Ok(exports),
            Err(t @ Signal::Throw(_)) => {
                self.heap.put(exports);
                Err(t)
            }
        }
    }

    /// The `eval()` rule: strings are evaluated in a child scope, any
    /// other value passes through.
    pub(crate) fn eval_value(&mut self, o: ObjRef) -> Ev {
        let Some(code) = self.heap.str_value(o) else {
            return Ok(self.heap.get(o));
        };

        let saved_env = self.cur_env;
        let env = self.heap.new_env(Some(saved_env));
        self.cur_env = env;

        let mut scan = Scanner::new(Source::from(&*code), self.constants.clone());
        let rc = self.eval_statement_list(&mut scan);

        self.heap.put(env);
        self.cur_env = saved_env;

        match rc {
            Ok(v) | Err(Signal::Return(v)) => Ok(v),
            Err(Signal::Break | Signal::Continue) => Ok(UNDEF),
            t @ Err(Signal::Throw(_)) => t,
        }
    }

    /// Map a top-level completion to the host-facing result.
    fn finish(&mut self, rc: Ev) -> Result<ObjRef, JsError> {
        match rc {
            Ok(v) | Err(Signal::Return(v)) => Ok(v),
            Err(Signal::Break | Signal::Continue) => Ok(UNDEF),
            Err(Signal::Throw(v)) => {
                let msg = self.heap.get_str(v).to_string();
                self.heap.put(v);
                Err(JsError::Uncaught(msg))
            }
        }
    }

    /*** Timers ***/

    /// Run the callback registered under `id`. One-shot timers are
    /// dropped after firing; a throwing periodic callback is cancelled,
    /// matching the original scheduler's behavior.
    pub fn fire_timer(&mut self, id: i32) -> Result<(), JsError> {
        let Some(ev) = self.timer_events.get(&id) else {
            return Ok(());
        };
        let (func, this, periodic) = (ev.func, ev.this, ev.periodic);

        let rc = self.call_function(this, &[func]);
        let result = match rc {
            Ok(v) => {
                self.heap.put(v);
                Ok(())
            }
            Err(Signal::Throw(v)) => {
                let msg = self.heap.get_str(v).to_string();
                self.heap.put(v);
                Err(JsError::Uncaught(msg))
            }
            Err(_) => Ok(()),
        };

        if !periodic || result.is_err() {
            self.drop_timer(id, result.is_err() && periodic);
        }
        result
    }

    pub(crate) fn drop_timer(&mut self, id: i32, cancel: bool) {
        if let Some(ev) = self.timer_events.shift_remove(&id) {
            if cancel {
                if let Some(t) = self.timers.as_mut() {
                    t.cancel(id);
                }
            }
            self.heap.put(ev.func);
            self.heap.put(ev.this);
        }
    }

    pub(crate) fn drop_all_timers(&mut self) {
        let ids: Vec<i32> = self.timer_events.keys().copied().collect();
        for id in ids {
            self.drop_timer(id, true);
        }
    }

    /*** Garbage collection ***/

    /// Mark from every root the interpreter holds and sweep the rest.
    /// Cooperative: call between evaluations.
    pub fn gc(&mut self) {
        let mut roots = vec![self.global_env, self.cur_env, self.this_obj];
        roots.extend(self.cur_args.iter().copied());
        roots.extend(self.modules.values().copied());
        for ev in self.timer_events.values() {
            roots.push(ev.func);
            roots.push(ev.this);
        }
        log::debug!("gc: {} live slots before sweep", self.heap.live_count());
        self.heap.gc(&roots);
        log::debug!("gc: {} live slots after sweep", self.heap.live_count());
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        self.drop_all_timers();
        let exports: Vec<ObjRef> = self.modules.values().copied().collect();
        for e in exports {
            self.heap.put(e);
        }
        self.modules.clear();
        self.heap.sweep_all();
    }
}
