//! Token-stream evaluator.
//!
//! There is no AST: expressions and statements are evaluated directly off
//! the scanner, and anything not taken (the untaken `if` arm, a
//! short-circuited operand, a loop body once its condition fails) is
//! skipped token-by-token. Loop and function bodies are saved scan states
//! that get re-scanned on every pass.

use std::rc::Rc;

use crate::core::scan::{Scanner, Tok};
use crate::core::value::{
    Class, FuncCode, ObjRef, Payload, PropRef, F_CONSTRUCTOR, FALSE, NULL, TRUE, UNDEF, ZERO,
};
use crate::core::Interp;

/// A non-local completion unwinding through `?`. `Return` and `Throw`
/// carry their value; loops absorb `Break`/`Continue`, call sites absorb
/// `Return`, and `try` absorbs `Throw`.
pub enum Signal {
    Return(ObjRef),
    Break,
    Continue,
    Throw(ObjRef),
}

/// Evaluation outcome: a value (acquired) or an unwinding completion.
pub type Ev = Result<ObjRef, Signal>;

/// The lvalue produced alongside an expression: either a concrete storage
/// location (`dst`), or a (base, field) pair for properties that do not
/// exist yet. `parent` feeds `this` on method calls; `field` holds the
/// last member key as a string object.
#[derive(Default)]
pub(crate) struct RefDesc {
    pub(crate) dst: Option<PropRef>,
    /// Counted.
    pub(crate) parent: Option<ObjRef>,
    /// Counted.
    pub(crate) field: Option<ObjRef>,
    /// Not counted; always reachable through the expression being
    /// evaluated.
    pub(crate) base: Option<ObjRef>,
}

fn is_assignment_tok(t: Tok) -> bool {
    t == Tok::ASSIGN
        || (t.has_eq_flag()
            && matches!(
                t.without_eq(),
                Tok::PLUS
                    | Tok::MINUS
                    | Tok::MULT
                    | Tok::DIV
                    | Tok::AND
                    | Tok::OR
                    | Tok::XOR
                    | Tok::MOD
                    | Tok::SHR
                    | Tok::SHL
                    | Tok::SHRZ
            ))
}

fn is_member_tok(t: Tok) -> bool {
    t == Tok::DOT || t == Tok::OPEN_MEMBER
}

fn is_statement_list_terminator(t: Tok) -> bool {
    matches!(t, Tok::CLOSE_SCOPE | Tok::EOF | Tok::CASE | Tok::DEFAULT)
}

/*** Skipping ***/

/// Skip one expression without evaluating it. Stops before `;` `)` `]`
/// `,` `:` and EOF; brackets of all three kinds are balanced so commas
/// and colons inside literals and argument lists don't terminate early.
pub(crate) fn skip_expression(scan: &mut Scanner) {
    loop {
        match scan.tok() {
            Tok::END_STATEMENT
            | Tok::CLOSE_PAREN
            | Tok::CLOSE_MEMBER
            | Tok::COMMA
            | Tok::COLON
            | Tok::EOF => return,
            Tok::OPEN_PAREN => {
                scan.next_token();
                skip_comma_list(scan);
                scan.force_match(Tok::CLOSE_PAREN);
            }
            Tok::OPEN_MEMBER => {
                scan.next_token();
                skip_comma_list(scan);
                scan.force_match(Tok::CLOSE_MEMBER);
            }
            Tok::OPEN_SCOPE => skip_braces(scan),
            Tok::QUESTION => {
                scan.next_token();
                skip_expression(scan);
                scan.force_match(Tok::COLON);
                skip_expression(scan);
            }
            _ => scan.next_token(),
        }
    }
}

fn skip_comma_list(scan: &mut Scanner) {
    loop {
        skip_expression(scan);
        if scan.tok() != Tok::COMMA {
            return;
        }
        scan.next_token();
    }
}

/// Skip a balanced `{ ... }` without interpreting its contents (object
/// literals inside skipped expressions).
fn skip_braces(scan: &mut Scanner) {
    let mut depth = 0;
    loop {
        match scan.tok() {
            Tok::OPEN_SCOPE => depth += 1,
            Tok::CLOSE_SCOPE => {
                depth -= 1;
                if depth == 0 {
                    scan.next_token();
                    return;
                }
            }
            Tok::EOF => return,
            _ => {}
        }
        scan.next_token();
    }
}

#[must_use]
pub(crate) fn skip_block(scan: &mut Scanner) -> bool {
    if !scan.try_match(Tok::OPEN_SCOPE) {
        return false;
    }
    while scan.tok() != Tok::CLOSE_SCOPE && scan.tok() != Tok::EOF {
        if scan.tok() == Tok::OPEN_SCOPE {
            if !skip_block(scan) {
                return false;
            }
            continue;
        }
        scan.next_token();
    }
    scan.try_match(Tok::CLOSE_SCOPE)
}

fn skip_for(scan: &mut Scanner) {
    scan.force_match(Tok::FOR);
    scan.force_match(Tok::OPEN_PAREN);
    skip_expression(scan);
    if scan.tok() != Tok::CLOSE_PAREN {
        // Not a for-in header.
        scan.force_match(Tok::END_STATEMENT);
        skip_expression(scan);
        scan.force_match(Tok::END_STATEMENT);
        skip_expression(scan);
    }
    scan.next_token(); // )
}

pub(crate) fn skip_statement(scan: &mut Scanner) {
    if scan.tok() == Tok::OPEN_SCOPE {
        let _ = skip_block(scan);
        return;
    }
    if scan.tok() == Tok::FOR {
        skip_for(scan);
    }
    while scan.tok() != Tok::END_STATEMENT && scan.tok() != Tok::EOF {
        skip_expression(scan);
        if scan.tok() == Tok::END_STATEMENT || scan.tok() == Tok::EOF {
            break;
        }
        scan.next_token();
    }
    let _ = scan.try_match(Tok::END_STATEMENT);
}

fn skip_statement_list(scan: &mut Scanner) {
    while !is_statement_list_terminator(scan.tok()) {
        skip_statement(scan);
    }
}

impl Interp {
    /*** Exceptions ***/

    pub(crate) fn throw_str(&mut self, msg: &str) -> Signal {
        let s = self.heap.new_string(msg.into());
        Signal::Throw(s)
    }

    pub(crate) fn parse_error(&mut self) -> Signal {
        self.throw_str("Exception: Parse error")
    }

    fn throw_invalid_lvalue(&mut self) -> Signal {
        self.throw_str("Exception: Invalid left-hand value in assignment")
    }

    /*** Lvalue references ***/

    pub(crate) fn ref_invalidate(&mut self, rd: &mut RefDesc) {
        if let Some(p) = rd.parent.take() {
            self.heap.put(p);
        }
        if let Some(f) = rd.field.take() {
            self.heap.put(f);
        }
        rd.dst = None;
        rd.base = None;
    }

    fn ref_set_parent(&mut self, rd: &mut RefDesc, parent: Option<ObjRef>) {
        let Some(parent) = parent else { return };
        if let Some(old) = rd.parent.replace(parent) {
            self.heap.put(old);
        }
    }

    fn ref_set_field(&mut self, rd: &mut RefDesc, field: ObjRef) {
        if let Some(old) = rd.field.replace(field) {
            self.heap.put(old);
        }
    }

    /// Resolve `property` (a string object whose reference this takes) on
    /// `obj`, or on the current scope chain when there is no object. An
    /// unbound identifier stays a candidate for the global environment so
    /// assignment can create it there.
    fn lookup(&mut self, obj: Option<ObjRef>, property: ObjRef, rd: &mut RefDesc) -> ObjRef {
        let key = self.heap.get_str(property);
        let owner = match obj {
            Some(o) => {
                rd.base = Some(o);
                o
            }
            None => {
                rd.base = Some(self.global_env);
                self.cur_env
            }
        };
        let (val, prop_ref) = self.heap.get_property(owner, &key);
        rd.dst = prop_ref;
        self.ref_set_field(rd, property);
        val.unwrap_or(UNDEF)
    }

    /*** Function invocation ***/

    /// Invoke `argv[0]` with an explicit `this`. Native functions return
    /// their result directly; scripted bodies run in a fresh env chained
    /// to the captured scope, with a fall-off-the-end result of
    /// undefined. A stray `break`/`continue` cannot escape a body.
    pub fn call_function(&mut self, this_obj: ObjRef, argv: &[ObjRef]) -> Ev {
        let ObjRef::Slot(id) = argv[0] else {
            return Err(self.throw_str("Exception: Object is not a function"));
        };
        let (params, code, scope) = match &self.heap.slot(id).payload {
            Payload::Func(f) => (f.params.clone(), f.code.clone(), f.scope),
            _ => return Err(self.throw_str("Exception: Object is not a function")),
        };

        let saved_this = self.this_obj;
        let saved_args = std::mem::replace(&mut self.cur_args, argv.to_vec());
        self.this_obj = this_obj;

        let rc = match code {
            FuncCode::Native(f) => f(self, this_obj, argv),
            FuncCode::Scripted(body) => {
                let saved_env = self.cur_env;
                let env = self.heap.new_env(Some(scope));
                self.cur_env = env;
                // params[0] is the function's own name; argv[0] is the
                // function itself, so recursion by name just works.
                for (i, param) in params.iter().enumerate() {
                    let arg = argv.get(i).copied().unwrap_or(UNDEF);
                    self.heap.get(arg);
                    self.heap.set_property(env, param, arg);
                }

                let mut body = (*body).clone();
                let rc = if body.tok() == Tok::OPEN_SCOPE {
                    self.eval_block(&mut body)
                } else {
                    self.eval_statement_list(&mut body)
                };

                self.heap.put(env);
                self.cur_env = saved_env;

                match rc {
                    Ok(v) => {
                        self.heap.put(v);
                        Ok(UNDEF)
                    }
                    Err(Signal::Return(v)) => Ok(v),
                    Err(Signal::Break) | Err(Signal::Continue) => Ok(UNDEF),
                    Err(t @ Signal::Throw(_)) => Err(t),
                }
            }
        };

        self.cur_args = saved_args;
        self.this_obj = saved_this;
        rc
    }

    /// `new f(...)`: functions flagged as their own construction routine
    /// are called as-is; otherwise a fresh object inheriting from the
    /// function's prototype becomes `this`, and an object-ish return
    /// value overrides it.
    pub(crate) fn construct_function(&mut self, argv: &[ObjRef]) -> Ev {
        let func = argv[0];
        if let ObjRef::Slot(id) = func {
            if self.heap.slot(id).flags & F_CONSTRUCTOR != 0 {
                return self.call_function(UNDEF, argv);
            }
        }

        let this_obj = self.heap.new_object();
        self.heap.inherit(this_obj, func);
        match self.call_function(this_obj, argv) {
            Err(sig) => {
                self.heap.put(this_obj);
                Err(sig)
            }
            Ok(ret) => {
                if matches!(
                    self.heap.class_of(ret),
                    Class::Function | Class::Object | Class::Array
                ) {
                    self.heap.put(this_obj);
                    Ok(ret)
                } else {
                    self.heap.put(ret);
                    Ok(this_obj)
                }
            }
        }
    }

    /// Parse and evaluate a call's argument list, then dispatch. Takes
    /// ownership of `callee`'s reference.
    fn eval_function_call(
        &mut self,
        callee: ObjRef,
        scan: &mut Scanner,
        this_hint: Option<ObjRef>,
        construct: bool,
    ) -> Ev {
        if callee == UNDEF || self.heap.class_of(callee) != Class::Function {
            let msg = if callee == UNDEF {
                "Exception: Object is undefined, not a function"
            } else {
                "Exception: Object is not a function"
            };
            log::error!("{}\n{}", msg, scan.trace());
            self.heap.put(callee);
            return Err(self.throw_str(msg));
        }

        let mut argv = vec![callee];
        let mut err = None;

        // Argument lists are optional in constructor calls.
        if !construct || scan.tok() == Tok::OPEN_PAREN {
            scan.force_match(Tok::OPEN_PAREN);
            if scan.tok() != Tok::CLOSE_PAREN {
                loop {
                    match self.eval_expression(scan) {
                        Ok(arg) => {
                            if argv.len() > self.max_call_args {
                                self.heap.put(arg);
                                err = Some(self.throw_str("Exception: Too many arguments"));
                                break;
                            }
                            argv.push(arg);
                        }
                        Err(sig) => {
                            err = Some(sig);
                            break;
                        }
                    }
                    if scan.tok() != Tok::COMMA {
                        break;
                    }
                    scan.next_token();
                }
            }
            if err.is_none() && !scan.try_match(Tok::CLOSE_PAREN) {
                err = Some(self.parse_error());
            }
        }

        let rc = match err {
            Some(sig) => Err(sig),
            None if construct => self.construct_function(&argv),
            None => {
                let this_obj = this_hint.unwrap_or(self.global_env);
                self.call_function(this_obj, &argv)
            }
        };

        for &arg in &argv {
            self.heap.put(arg);
        }
        rc
    }

    /*** Literals and atoms ***/

    fn eval_object_literal(&mut self, scan: &mut Scanner) -> Ev {
        let o = self.heap.new_object();
        scan.force_match(Tok::OPEN_SCOPE);

        while scan.tok() != Tok::CLOSE_SCOPE {
            if let Err(sig) = self.eval_property(scan, o) {
                self.heap.put(o);
                return Err(sig);
            }
            if scan.tok() != Tok::COMMA {
                break;
            }
            scan.next_token();
        }

        if !scan.try_match(Tok::CLOSE_SCOPE) {
            self.heap.put(o);
            return Err(self.parse_error());
        }
        Ok(o)
    }

    fn eval_property(&mut self, scan: &mut Scanner, o: ObjRef) -> Result<(), Signal> {
        let tok = scan.tok();
        let key: Rc<str> = match tok {
            Tok::PROTOTYPE => {
                scan.next_token();
                "prototype".into()
            }
            Tok::ID => scan.get_identifier().ok_or_else(|| self.parse_error())?,
            Tok::STRING => scan.get_string().ok_or_else(|| self.parse_error())?,
            Tok::NUM => {
                let n = scan.get_num().ok_or_else(|| self.parse_error())?;
                n.to_string().into()
            }
            _ => return Err(self.parse_error()),
        };

        if !scan.try_match(Tok::COLON) {
            return Err(self.parse_error());
        }

        let value = self.eval_expression(scan)?;
        if tok == Tok::PROTOTYPE {
            self.heap.set_internal_property(o, &key, value);
        } else {
            self.heap.set_property(o, &key, value);
        }
        Ok(())
    }

    fn eval_array_literal(&mut self, scan: &mut Scanner) -> Ev {
        let o = self.heap.new_array();
        scan.force_match(Tok::OPEN_MEMBER);

        if scan.tok() != Tok::CLOSE_MEMBER {
            loop {
                match self.eval_expression(scan) {
                    Ok(item) => {
                        self.heap.array_push(o, item);
                    }
                    Err(sig) => {
                        self.heap.put(o);
                        return Err(sig);
                    }
                }
                if scan.tok() != Tok::COMMA {
                    break;
                }
                scan.next_token();
            }
        }

        scan.force_match(Tok::CLOSE_MEMBER);
        Ok(o)
    }

    fn eval_atom(&mut self, scan: &mut Scanner, obj: Option<ObjRef>, rd: &mut RefDesc) -> Ev {
        let tok = scan.tok();
        match tok {
            Tok::OPEN_PAREN => {
                scan.next_token();
                let v = self.eval_expression(scan)?;
                if !scan.try_match(Tok::CLOSE_PAREN) {
                    self.heap.put(v);
                    return Err(self.parse_error());
                }
                Ok(v)
            }
            Tok::THIS => {
                scan.next_token();
                self.ref_invalidate(rd);
                Ok(self.heap.get(self.this_obj))
            }
            Tok::ARGUMENTS => {
                scan.next_token();
                if self.cur_args.is_empty() {
                    return Err(self.throw_str("Exception: Not in function call"));
                }
                self.ref_invalidate(rd);
                let args = self.cur_args.clone();
                Ok(self.heap.new_arguments(&args))
            }
            Tok::PROTOTYPE => {
                scan.next_token();
                let Some(obj) = obj else {
                    return Err(self.parse_error());
                };
                match self.heap.get_own_property(obj, "prototype") {
                    Some((v, prop_ref)) => {
                        rd.dst = prop_ref;
                        Ok(v)
                    }
                    None => {
                        let field = self.heap.new_string("prototype".into());
                        self.ref_set_field(rd, field);
                        rd.base = Some(obj);
                        rd.dst = None;
                        Ok(UNDEF)
                    }
                }
            }
            Tok::OPEN_SCOPE => self.eval_object_literal(scan),
            Tok::OPEN_MEMBER => self.eval_array_literal(scan),
            Tok::FUNCTION => self.eval_function(scan, false),
            Tok::NOT | Tok::TILDE | Tok::PLUS | Tok::MINUS => {
                scan.next_token();
                let v = self.eval_functions(scan, rd)?;
                Ok(self.heap.do_op(tok, ZERO, v))
            }
            Tok::NUM => {
                let n = scan.get_num().ok_or_else(|| self.parse_error())?;
                Ok(self.heap.new_num(n))
            }
            Tok::TRUE => {
                scan.next_token();
                Ok(TRUE)
            }
            Tok::FALSE => {
                scan.next_token();
                Ok(FALSE)
            }
            Tok::NULL => {
                scan.next_token();
                Ok(NULL)
            }
            Tok::UNDEFINED => {
                scan.next_token();
                Ok(UNDEF)
            }
            Tok::STRING => {
                let s = scan.get_string().ok_or_else(|| self.parse_error())?;
                Ok(self.heap.new_string(s))
            }
            Tok::ID => {
                let id = scan.get_identifier().ok_or_else(|| self.parse_error())?;
                Ok(self.heap.new_string(id))
            }
            Tok::CONSTANT => Ok(ObjRef::Int(scan.get_constant())),
            _ => Err(self.parse_error()),
        }
    }

    /// Evaluate a member chain (`a.b[c].d`), tracking the parent object
    /// for method-call `this` binding.
    fn eval_member(
        &mut self,
        scan: &mut Scanner,
        start: Option<ObjRef>,
        rd: &mut RefDesc,
    ) -> Ev {
        let mut parent: Option<ObjRef> = None;
        let mut cur = match start {
            Some(o) => {
                parent = Some(self.heap.get(o));
                o
            }
            None => {
                let tok = scan.tok();
                let atom = self.eval_atom(scan, None, rd)?;
                if tok == Tok::ID {
                    // A bare identifier: the atom is its name, resolved
                    // against the scope chain.
                    self.lookup(None, atom, rd)
                } else {
                    atom
                }
            }
        };

        while is_member_tok(scan.tok()) {
            if cur == UNDEF {
                if let Some(p) = parent.take() {
                    self.heap.put(p);
                }
                self.ref_invalidate(rd);
                log::error!("property access on undefined\n{}", scan.trace());
                return Err(self.throw_str("Exception: Can't access property of undefined"));
            }

            self.ref_set_parent(rd, parent.take());
            parent = Some(cur);
            let owner = cur;

            if scan.tok() == Tok::DOT {
                scan.next_token();
                let tok = scan.tok();
                if tok != Tok::ID && tok != Tok::PROTOTYPE {
                    if let Some(p) = parent.take() {
                        self.heap.put(p);
                    }
                    return Err(self.parse_error());
                }
                let atom = match self.eval_atom(scan, Some(owner), rd) {
                    Ok(v) => v,
                    Err(sig) => {
                        if let Some(p) = parent.take() {
                            self.heap.put(p);
                        }
                        return Err(sig);
                    }
                };
                cur = if tok == Tok::ID {
                    self.lookup(Some(owner), atom, rd)
                } else {
                    atom
                };
            } else {
                scan.next_token();
                let key = match self.eval_expression(scan) {
                    Ok(v) => v,
                    Err(sig) => {
                        if let Some(p) = parent.take() {
                            self.heap.put(p);
                        }
                        return Err(sig);
                    }
                };
                scan.force_match(Tok::CLOSE_MEMBER);
                cur = self.lookup(Some(owner), key, rd);
            }
        }

        self.ref_set_parent(rd, parent.take());
        Ok(cur)
    }

    fn eval_new(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        let is_new = scan.tok() == Tok::NEW;
        if is_new {
            scan.next_token();
        }

        let o = self.eval_member(scan, None, rd)?;
        if is_new {
            let mut constructed = self.eval_function_call(o, scan, None, true)?;
            // Constructed objects are not valid lvalues.
            self.ref_invalidate(rd);
            if is_member_tok(scan.tok()) {
                constructed = self.eval_member(scan, Some(constructed), rd)?;
            }
            return Ok(constructed);
        }
        Ok(o)
    }

    fn eval_functions(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        let mut o = self.eval_new(scan, rd)?;

        while scan.tok() == Tok::OPEN_PAREN {
            let this_hint = rd.parent;
            o = self.eval_function_call(o, scan, this_hint, false)?;
            // Function calls do not return references.
            self.ref_invalidate(rd);
            if is_member_tok(scan.tok()) {
                o = self.eval_member(scan, Some(o), rd)?;
            }
        }
        Ok(o)
    }

    /*** Unary increment and decrement ***/

    fn eval_postfix(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        let o = self.eval_functions(scan, rd)?;

        let tok = scan.tok();
        if tok != Tok::PLUS_PLUS && tok != Tok::MINUS_MINUS {
            return Ok(o);
        }

        if let Some(dst) = rd.dst.clone() {
            self.heap.get(o);
            let new = self.heap.do_op(tok, o, ZERO);
            self.heap.write_prop_ref(&dst, new);
        } else {
            if o == UNDEF || rd.base.is_none() {
                self.heap.put(o);
                return Err(self.throw_invalid_lvalue());
            }
            let field = rd.field.expect("lvalue base without a field");
            let key = self.heap.get_str(field);
            self.heap.get(o);
            let new = self.heap.do_op(tok, o, ZERO);
            self.heap.set_property(rd.base.expect("just checked"), &key, new);
        }

        scan.next_token();
        self.ref_invalidate(rd);
        Ok(o)
    }

    fn eval_prefix(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        let tok = scan.tok();
        if tok != Tok::PLUS_PLUS && tok != Tok::MINUS_MINUS {
            return self.eval_postfix(scan, rd);
        }

        scan.next_token();
        let old = self.eval_postfix(scan, rd)?;

        let dst = rd.dst.clone();
        if dst.is_none() && (old == UNDEF || rd.base.is_none()) {
            self.heap.put(old);
            return Err(self.throw_invalid_lvalue());
        }

        let new = self.heap.do_op(tok, old, ZERO);
        match dst {
            Some(dst) => {
                self.heap.get(new);
                self.heap.write_prop_ref(&dst, new);
            }
            None => {
                let field = rd.field.expect("lvalue base without a field");
                let key = self.heap.get_str(field);
                self.heap.get(new);
                self.heap.set_property(rd.base.expect("just checked"), &key, new);
            }
        }

        self.ref_invalidate(rd);
        Ok(new)
    }

    /*** Binary operator ladder ***/

    /// One precedence level: left-associative chain of operators accepted
    /// by `accepts`, with optional short-circuit (the untaken operand is
    /// skipped, not evaluated).
    fn eval_binary_chain(
        &mut self,
        scan: &mut Scanner,
        rd: &mut RefDesc,
        accepts: fn(Tok) -> bool,
        short_circuits: fn(&Interp, ObjRef) -> bool,
        lower: fn(&mut Interp, &mut Scanner, &mut RefDesc) -> Ev,
    ) -> Ev {
        let mut lhs = lower(self, scan, rd)?;
        let mut tok = scan.tok();
        if !accepts(tok) {
            return Ok(lhs);
        }

        loop {
            self.ref_invalidate(rd);
            scan.next_token();

            if short_circuits(self, lhs) {
                skip_expression(scan);
                return Ok(lhs);
            }

            let rhs = match lower(self, scan, rd) {
                Ok(v) => v,
                Err(sig) => {
                    self.heap.put(lhs);
                    return Err(sig);
                }
            };
            lhs = self.heap.do_op(tok, lhs, rhs);

            tok = scan.tok();
            if !accepts(tok) {
                break;
            }
        }
        self.ref_invalidate(rd);
        Ok(lhs)
    }

    fn eval_factor(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| matches!(t, Tok::DIV | Tok::MULT | Tok::MOD),
            |_, _| false,
            Interp::eval_prefix,
        )
    }

    fn eval_term(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| matches!(t, Tok::PLUS | Tok::MINUS),
            |_, _| false,
            Interp::eval_factor,
        )
    }

    fn eval_shifted(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| matches!(t, Tok::SHL | Tok::SHR | Tok::SHRZ),
            |_, _| false,
            Interp::eval_term,
        )
    }

    fn eval_related(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| matches!(t, Tok::IN | Tok::GT | Tok::GE | Tok::LT | Tok::LE),
            |_, _| false,
            Interp::eval_shifted,
        )
    }

    fn eval_equalized(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| {
                let base = t.without_strict();
                base == Tok::IS_EQ || base == Tok::NOT_EQ
            },
            |_, _| false,
            Interp::eval_related,
        )
    }

    fn eval_anded(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(scan, rd, |t| t == Tok::AND, |_, _| false, Interp::eval_equalized)
    }

    fn eval_xored(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(scan, rd, |t| t == Tok::XOR, |_, _| false, Interp::eval_anded)
    }

    fn eval_ored(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(scan, rd, |t| t == Tok::OR, |_, _| false, Interp::eval_xored)
    }

    fn eval_log_anded(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| t == Tok::LOG_AND,
            |interp, lhs| !interp.heap.is_true(lhs),
            Interp::eval_ored,
        )
    }

    fn eval_log_ored(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_binary_chain(
            scan,
            rd,
            |t| t == Tok::LOG_OR,
            |interp, lhs| interp.heap.is_true(lhs),
            Interp::eval_log_anded,
        )
    }

    fn eval_ternary(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        let cond_val = self.eval_log_ored(scan, rd)?;
        if scan.tok() != Tok::QUESTION {
            return Ok(cond_val);
        }

        let condition = self.heap.is_true(cond_val);
        self.heap.put(cond_val);
        scan.force_match(Tok::QUESTION);

        let mut arm_rd = RefDesc::default();
        let rc = if condition {
            let rc = self.eval_ternary(scan, &mut arm_rd);
            if rc.is_ok() {
                scan.force_match(Tok::COLON);
                skip_expression(scan);
            }
            rc
        } else {
            skip_expression(scan);
            scan.force_match(Tok::COLON);
            self.eval_ternary(scan, &mut arm_rd)
        };
        self.ref_invalidate(&mut arm_rd);
        rc
    }

    /*** Assignment ***/

    /// Takes ownership of `old` (the evaluated lvalue's current value).
    /// Plain assignment evaluates to the new value; compound assignment
    /// evaluates to the previous one.
    fn eval_assignment(&mut self, scan: &mut Scanner, old: ObjRef, rd: &mut RefDesc) -> Ev {
        let tok = scan.tok();

        if rd.dst.is_none() {
            if old == UNDEF && tok != Tok::ASSIGN {
                self.heap.put(old);
                return Err(self.throw_str("Exception: Requested object is undefined"));
            }
            if rd.base.is_none() {
                self.heap.put(old);
                return Err(self.throw_invalid_lvalue());
            }
        }

        scan.next_token();
        let new = match self.eval_expression(scan) {
            Ok(v) => v,
            Err(sig) => {
                self.heap.put(old);
                return Err(sig);
            }
        };

        if let Some(dst) = rd.dst.clone() {
            if tok == Tok::ASSIGN {
                self.heap.get(new);
                self.heap.write_prop_ref(&dst, new);
                self.heap.put(old);
                Ok(new)
            } else {
                self.heap.get(old);
                let result = self.heap.do_op(tok.without_eq(), old, new);
                self.heap.write_prop_ref(&dst, result);
                Ok(old)
            }
        } else {
            let base = rd.base.expect("checked before evaluating the right side");
            let field = rd.field.expect("lvalue base without a field");
            let key = self.heap.get_str(field);
            if tok == Tok::ASSIGN {
                self.heap.get(new);
                self.heap.set_property(base, &key, new);
                self.heap.put(old);
                Ok(new)
            } else {
                self.heap.get(old);
                let result = self.heap.do_op(tok.without_eq(), old, new);
                self.heap.set_property(base, &key, result);
                Ok(old)
            }
        }
    }

    pub(crate) fn eval_expression_ref(&mut self, scan: &mut Scanner, rd: &mut RefDesc) -> Ev {
        self.eval_ternary(scan, rd)
    }

    pub(crate) fn eval_expression(&mut self, scan: &mut Scanner) -> Ev {
        let mut rd = RefDesc::default();
        let mut rc = self.eval_expression_ref(scan, &mut rd);
        if let Ok(v) = rc {
            if is_assignment_tok(scan.tok()) {
                rc = self.eval_assignment(scan, v, &mut rd);
            }
        }
        self.ref_invalidate(&mut rd);
        rc
    }

    /*** Statements ***/

    fn eval_var_single(&mut self, scan: &mut Scanner) -> Result<(), Signal> {
        let name = scan.get_identifier().ok_or_else(|| self.parse_error())?;

        let value = if scan.tok() == Tok::ASSIGN {
            scan.next_token();
            self.eval_expression(scan)?
        } else {
            UNDEF
        };

        let env = self.cur_env;
        self.heap.set_property(env, &name, value);
        Ok(())
    }

    fn eval_var(&mut self, scan: &mut Scanner) -> Result<(), Signal> {
        scan.force_match(Tok::VAR);
        self.eval_var_single(scan)?;
        while scan.tok() == Tok::COMMA {
            scan.next_token();
            self.eval_var_single(scan)?;
        }
        Ok(())
    }

    fn eval_paren_condition(&mut self, scan: &mut Scanner, skip: bool) -> Result<bool, Signal> {
        if !scan.try_match(Tok::OPEN_PAREN) {
            return Err(self.parse_error());
        }
        let cond = if skip {
            skip_expression(scan);
            false
        } else {
            let v = self.eval_expression(scan)?;
            let t = self.heap.is_true(v);
            self.heap.put(v);
            t
        };
        if !scan.try_match(Tok::CLOSE_PAREN) {
            return Err(self.parse_error());
        }
        Ok(cond)
    }

    fn eval_paren_expression(&mut self, scan: &mut Scanner) -> Ev {
        if !scan.try_match(Tok::OPEN_PAREN) {
            return Err(self.parse_error());
        }
        let v = self.eval_expression(scan)?;
        if !scan.try_match(Tok::CLOSE_PAREN) {
            self.heap.put(v);
            return Err(self.parse_error());
        }
        Ok(v)
    }

    /// One `if (...)` arm: evaluate or skip the condition, then the
    /// statement. Reports whether the condition held.
    fn eval_if_arm(&mut self, scan: &mut Scanner, skip: bool) -> Result<bool, Signal> {
        let condition = self.eval_paren_condition(scan, skip)?;
        if condition && !skip {
            let v = self.eval_statement(scan)?;
            self.heap.put(v);
        } else {
            skip_statement(scan);
        }
        Ok(condition)
    }

    fn eval_if(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::IF);
        let mut taken = self.eval_if_arm(scan, false)?;

        while scan.tok() == Tok::ELSE {
            scan.next_token();
            if scan.tok() == Tok::IF {
                scan.next_token();
                taken |= self.eval_if_arm(scan, taken)?;
                continue;
            }
            // Final else.
            if !taken {
                let v = self.eval_statement(scan)?;
                self.heap.put(v);
            } else {
                skip_statement(scan);
            }
            break;
        }
        Ok(UNDEF)
    }

    fn eval_while(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::WHILE);
        let start = scan.save();
        let mut broke = false;

        loop {
            let next = self.eval_paren_condition(scan, broke)?;
            if !next || self.stopped() {
                skip_statement(scan);
                break;
            }

            match self.eval_statement(scan) {
                Ok(v) => self.heap.put(v),
                Err(Signal::Break) => broke = true,
                Err(Signal::Continue) => {}
                Err(sig) => return Err(sig),
            }
            scan.restore(&start);
        }
        Ok(UNDEF)
    }

    fn eval_do_while(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::DO);
        let body = scan.save();
        skip_statement(scan);
        scan.force_match(Tok::WHILE);
        let cond = scan.save();
        if !scan.try_match(Tok::OPEN_PAREN) {
            return Err(self.parse_error());
        }
        skip_expression(scan);
        if !scan.try_match(Tok::CLOSE_PAREN) {
            return Err(self.parse_error());
        }
        let end = scan.save();

        loop {
            scan.restore(&body);
            match self.eval_statement(scan) {
                Ok(v) => self.heap.put(v),
                Err(Signal::Break) => break,
                Err(Signal::Continue) => {}
                Err(sig) => {
                    scan.restore(&end);
                    return Err(sig);
                }
            }
            if self.stopped() {
                break;
            }

            scan.restore(&cond);
            match self.eval_paren_condition(scan, false) {
                Ok(true) => {}
                Ok(false) => break,
                Err(sig) => {
                    scan.restore(&end);
                    return Err(sig);
                }
            }
        }
        scan.restore(&end);
        Ok(UNDEF)
    }

    /// Detect `lhs in rhs` inside a `for (...)` header. On a match,
    /// returns the lhs as a narrowed scan slice plus the evaluated
    /// right-hand object; otherwise rewinds to where it started.
    fn parse_for_in(
        &mut self,
        scan: &mut Scanner,
    ) -> Result<Option<(Scanner, ObjRef)>, Signal> {
        let start = scan.save();
        let mut saw_lhs = false;

        while scan.tok() != Tok::CLOSE_PAREN && scan.tok() != Tok::EOF {
            if scan.tok() == Tok::END_STATEMENT {
                break;
            }
            if scan.tok() == Tok::OPEN_PAREN {
                scan.force_match(Tok::OPEN_PAREN);
                skip_expression(scan);
                scan.force_match(Tok::CLOSE_PAREN);
                continue;
            }
            if scan.tok() == Tok::OPEN_MEMBER {
                scan.force_match(Tok::OPEN_MEMBER);
                skip_expression(scan);
                scan.force_match(Tok::CLOSE_MEMBER);
                continue;
            }
            if scan.tok() == Tok::IN {
                if !saw_lhs {
                    return Err(self.parse_error());
                }
                // Slicing at the `in` token keeps everything before it,
                // which is exactly the binding target.
                let lhs = Scanner::slice(&start, scan);
                scan.force_match(Tok::IN);
                let rhs = self.eval_expression(scan)?;
                if !scan.try_match(Tok::CLOSE_PAREN) {
                    self.heap.put(rhs);
                    return Err(self.parse_error());
                }
                return Ok(Some((lhs, rhs)));
            }
            saw_lhs = true;
            scan.next_token();
        }

        scan.restore(&start);
        Ok(None)
    }

    fn eval_for_in(&mut self, scan: &mut Scanner, in_lhs: &Scanner, rhs: ObjRef) -> Ev {
        let body = scan.save();
        skip_statement(scan);
        let end = scan.save();

        let keys = self.heap.enum_keys(rhs);
        for key in keys {
            // Re-evaluate the binding target every iteration; it may be a
            // property expression whose base changes.
            let mut rd = RefDesc::default();
            scan.restore(in_lhs);
            let lhs = match self.eval_expression_ref(scan, &mut rd) {
                Ok(v) => v,
                Err(sig) => {
                    self.ref_invalidate(&mut rd);
                    scan.restore(&end);
                    return Err(sig);
                }
            };

            let key_obj = self.heap.new_string(key.clone());
            if let Some(dst) = rd.dst.clone() {
                self.heap.write_prop_ref(&dst, key_obj);
            } else if let Some(base) = rd.base {
                let field = rd.field.expect("lvalue base without a field");
                let field_key = self.heap.get_str(field);
                self.heap.set_property(base, &field_key, key_obj);
            } else {
                self.heap.put(key_obj);
                self.heap.put(lhs);
                self.ref_invalidate(&mut rd);
                scan.restore(&end);
                return Err(self.throw_invalid_lvalue());
            }
            self.heap.put(lhs);
            self.ref_invalidate(&mut rd);

            scan.restore(&body);
            match self.eval_statement(scan) {
                Ok(v) => self.heap.put(v),
                Err(Signal::Break) => break,
                Err(Signal::Continue) => {}
                Err(sig) => {
                    scan.restore(&end);
                    return Err(sig);
                }
            }
            if self.stopped() {
                break;
            }
        }

        scan.restore(&end);
        Ok(UNDEF)
    }

    fn eval_for(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::FOR);
        scan.force_match(Tok::OPEN_PAREN);

        // `for (var k in o)` pre-binds k in the current scope; the header
        // is then handled like any other for-in target.
        let before_init = scan.save();
        let has_var = scan.tok() == Tok::VAR;
        if has_var {
            scan.next_token();
        }

        if let Some((in_lhs, rhs)) = self.parse_for_in(scan)? {
            if has_var {
                let mut probe = in_lhs.clone();
                if let Some(name) = probe.get_identifier() {
                    let env = self.cur_env;
                    self.heap.set_property(env, &name, UNDEF);
                }
            }
            let rc = self.eval_for_in(scan, &in_lhs, rhs);
            self.heap.put(rhs);
            return rc;
        }
        if has_var {
            scan.restore(&before_init);
        }

        // Initializer
        if scan.tok() == Tok::VAR {
            self.eval_var(scan)?;
        } else if scan.tok() != Tok::END_STATEMENT {
            let v = self.eval_expression(scan)?;
            self.heap.put(v);
        }
        scan.force_match(Tok::END_STATEMENT);

        // Condition
        let cond = scan.save();
        let cond_empty = scan.tok() == Tok::END_STATEMENT;
        let mut next = if cond_empty {
            true
        } else {
            let v = self.eval_expression(scan)?;
            let t = self.heap.is_true(v);
            self.heap.put(v);
            t
        };
        scan.force_match(Tok::END_STATEMENT);

        // Repeated expression
        let repeated = scan.save();
        skip_expression(scan);
        scan.force_match(Tok::CLOSE_PAREN);

        // Body
        let body = scan.save();
        skip_statement(scan);
        let end = scan.save();

        while next {
            scan.restore(&body);
            match self.eval_statement(scan) {
                Ok(v) => self.heap.put(v),
                Err(Signal::Break) => break,
                Err(Signal::Continue) => {}
                Err(sig) => {
                    scan.restore(&end);
                    return Err(sig);
                }
            }
            if self.stopped() {
                break;
            }

            scan.restore(&repeated);
            if scan.tok() != Tok::CLOSE_PAREN {
                match self.eval_expression(scan) {
                    Ok(v) => self.heap.put(v),
                    Err(sig) => {
                        scan.restore(&end);
                        return Err(sig);
                    }
                }
            }

            scan.restore(&cond);
            next = if cond_empty {
                true
            } else {
                match self.eval_expression(scan) {
                    Ok(v) => {
                        let t = self.heap.is_true(v);
                        self.heap.put(v);
                        t
                    }
                    Err(sig) => {
                        scan.restore(&end);
                        return Err(sig);
                    }
                }
            };
        }

        scan.restore(&end);
        Ok(UNDEF)
    }

    pub(crate) fn obj_eq(&mut self, a: ObjRef, b: ObjRef) -> bool {
        self.heap.get(a);
        self.heap.get(b);
        let r = self.heap.do_op(Tok::IS_EQ_STRICT, a, b);
        let eq = self.heap.is_true(r);
        self.heap.put(r);
        eq
    }

    fn eval_case(
        &mut self,
        scan: &mut Scanner,
        found_match: &mut bool,
        match_val: ObjRef,
    ) -> Result<(), Signal> {
        match scan.tok() {
            Tok::CASE => {
                scan.next_token();
                if *found_match {
                    skip_expression(scan);
                } else {
                    let item = self.eval_expression(scan)?;
                    *found_match = self.obj_eq(item, match_val);
                    self.heap.put(item);
                }
            }
            Tok::DEFAULT => {
                scan.next_token();
                *found_match = true;
            }
            _ => return Err(self.parse_error()),
        }

        if !scan.try_match(Tok::COLON) {
            return Err(self.parse_error());
        }
        Ok(())
    }

    fn eval_switch(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::SWITCH);
        let match_val = self.eval_paren_expression(scan)?;
        let start = scan.save();

        let mut rc: Result<(), Signal> = Ok(());
        'body: {
            if !scan.try_match(Tok::OPEN_SCOPE) {
                rc = Err(self.parse_error());
                break 'body;
            }

            let mut found_match = false;
            while scan.tok() != Tok::CLOSE_SCOPE {
                if let Err(sig) = self.eval_case(scan, &mut found_match, match_val) {
                    rc = Err(sig);
                    break 'body;
                }
                if !found_match {
                    skip_statement_list(scan);
                    continue;
                }
                match self.eval_statement_list(scan) {
                    Ok(v) => self.heap.put(v),
                    Err(sig) => {
                        // Unwinding out of a case: reposition past the
                        // whole switch body.
                        scan.restore(&start);
                        let _ = skip_block(scan);
                        rc = Err(sig);
                        break 'body;
                    }
                }
            }

            if !scan.try_match(Tok::CLOSE_SCOPE) {
                rc = Err(self.parse_error());
            }
        }

        self.heap.put(match_val);
        match rc {
            Ok(()) | Err(Signal::Break) => Ok(UNDEF),
            Err(sig) => Err(sig),
        }
    }

    /// Evaluate a `{ ... }` block in place, leaving the scan after it
    /// whether or not the body unwound.
    fn do_block(&mut self, scan: &mut Scanner) -> Ev {
        let start = scan.save();
        if !skip_block(scan) {
            return Err(self.parse_error());
        }
        let end = scan.save();

        scan.restore(&start);
        let rc = self.eval_block(scan);
        scan.restore(&end);
        rc
    }

    fn eval_try(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::TRY);

        let mut pending = match self.do_block(scan) {
            Ok(v) => {
                self.heap.put(v);
                None
            }
            Err(sig) => Some(sig),
        };

        if scan.tok() == Tok::CATCH {
            scan.next_token();
            scan.force_match(Tok::OPEN_PAREN);
            let id = scan.get_identifier().ok_or_else(|| self.parse_error())?;
            scan.force_match(Tok::CLOSE_PAREN);

            if let Some(Signal::Throw(exc)) = pending {
                pending = None;

                let saved_env = self.cur_env;
                let env = self.heap.new_env(Some(saved_env));
                self.cur_env = env;
                // The catch variable takes over the thrown reference.
                self.heap.set_property(env, &id, exc);

                match self.do_block(scan) {
                    Ok(v) => self.heap.put(v),
                    Err(sig) => pending = Some(sig),
                }

                self.heap.put(env);
                self.cur_env = saved_env;
            } else {
                let _ = skip_block(scan);
            }
        }

        match pending {
            Some(sig) => Err(sig),
            None => Ok(UNDEF),
        }
    }

    fn eval_return(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::RETURN);
        let v = if scan.tok() != Tok::END_STATEMENT {
            self.eval_expression(scan)?
        } else {
            UNDEF
        };
        Err(Signal::Return(v))
    }

    fn eval_throw(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::THROW);
        let v = self.eval_expression(scan)?;
        scan.force_match(Tok::END_STATEMENT);
        Err(Signal::Throw(v))
    }

    /*** Function definitions ***/

    pub(crate) fn parse_param_list(
        &mut self,
        scan: &mut Scanner,
        params: &mut Vec<Rc<str>>,
    ) -> Result<(), Signal> {
        let first = scan.get_identifier().ok_or_else(|| self.parse_error())?;
        params.push(first);
        while scan.tok() == Tok::COMMA {
            scan.next_token();
            let p = scan.get_identifier().ok_or_else(|| self.parse_error())?;
            params.push(p);
        }
        Ok(())
    }

    fn eval_function_definition(&mut self, fname: Rc<str>, scan: &mut Scanner) -> Ev {
        if !scan.try_match(Tok::OPEN_PAREN) {
            return Err(self.parse_error());
        }

        let mut params = vec![fname];
        if scan.tok() == Tok::ID {
            self.parse_param_list(scan, &mut params)?;
        }
        if !scan.try_match(Tok::CLOSE_PAREN) {
            return Err(self.parse_error());
        }

        let start = scan.save();
        if !skip_block(scan) {
            return Err(self.parse_error());
        }
        let body = Scanner::slice(&start, scan);

        let scope = self.cur_env;
        Ok(self
            .heap
            .new_function(params, FuncCode::Scripted(Box::new(body)), scope))
    }

    /// `function name() {}` as a statement binds `name` in the current
    /// scope; as an expression, the name (if any) only exists inside the
    /// function for self-recursion.
    fn eval_function(&mut self, scan: &mut Scanner, statement: bool) -> Ev {
        scan.force_match(Tok::FUNCTION);

        let name = if scan.tok() == Tok::ID {
            scan.get_identifier()
        } else {
            None
        };

        let fname: Rc<str> = match (&name, statement) {
            (Some(n), false) => n.clone(),
            _ => "__builtin_func__".into(),
        };

        let func = self.eval_function_definition(fname, scan)?;

        if let (Some(name), true) = (name, statement) {
            self.heap.get(func);
            let env = self.cur_env;
            self.heap.set_property(env, &name, func);
        }
        Ok(func)
    }

    /*** Statements and blocks ***/

    pub(crate) fn eval_statement(&mut self, scan: &mut Scanner) -> Ev {
        scan.set_trace_point();

        match scan.tok() {
            Tok::END_STATEMENT => {
                scan.next_token();
                Ok(UNDEF)
            }
            Tok::OPEN_SCOPE => self.eval_block(scan),
            Tok::IF => self.eval_if(scan),
            Tok::WHILE => self.eval_while(scan),
            Tok::DO => self.eval_do_while(scan),
            Tok::FOR => self.eval_for(scan),
            Tok::VAR => {
                self.eval_var(scan)?;
                if !scan.try_match(Tok::END_STATEMENT) {
                    return Err(self.parse_error());
                }
                Ok(UNDEF)
            }
            Tok::RETURN => self.eval_return(scan),
            Tok::THROW => self.eval_throw(scan),
            Tok::CONTINUE => {
                scan.force_match(Tok::CONTINUE);
                Err(Signal::Continue)
            }
            Tok::BREAK => {
                scan.force_match(Tok::BREAK);
                Err(Signal::Break)
            }
            Tok::TRY => self.eval_try(scan),
            Tok::FUNCTION => self.eval_function(scan, true),
            Tok::SWITCH => self.eval_switch(scan),
            // Handled in eval_switch.
            Tok::CASE | Tok::DEFAULT => Ok(UNDEF),
            _ => {
                let v = self.eval_expression(scan)?;
                if !scan.try_match(Tok::END_STATEMENT) {
                    self.heap.put(v);
                    return Err(self.parse_error());
                }
                Ok(v)
            }
        }
    }

    /// Evaluate statements until a terminator; the result is the last
    /// statement that produced a value.
    pub(crate) fn eval_statement_list(&mut self, scan: &mut Scanner) -> Ev {
        let mut ret = UNDEF;
        while !is_statement_list_terminator(scan.tok()) {
            match self.eval_statement(scan) {
                Ok(v) => {
                    if v != UNDEF {
                        self.heap.put(ret);
                        ret = v;
                    }
                }
                Err(sig) => {
                    self.heap.put(ret);
                    return Err(sig);
                }
            }
        }
        Ok(ret)
    }

    pub(crate) fn eval_block(&mut self, scan: &mut Scanner) -> Ev {
        scan.force_match(Tok::OPEN_SCOPE);
        let v = self.eval_statement_list(scan)?;
        scan.force_match(Tok::CLOSE_SCOPE);
        Ok(v)
    }
}
