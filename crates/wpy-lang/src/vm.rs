//! Bytecode interpreter.
//!
//! Each run gets one frame from the runtime (pystack or heap): slot 0 holds
//! the globals dict, the rest is the operand stack. Every heap reference the
//! VM works with stays in a frame slot until the operation consuming it has
//! finished allocating, so collections triggered mid-op always find it.

use tracing::debug;
use wpy_runtime::obj::{dict, exc, module, ops, ExcType, PyResult, Raised, Value};
use wpy_runtime::vfs::{ImportStat, PathResolver};
use wpy_runtime::{Frame, Frontend, InputKind, Qstr, Runtime};

use crate::compile::{compile_module, Code, Op};
use crate::lexer::tokenize;
use crate::parser::Parser;

const GLOBALS: usize = 0;
const STACK_BASE: usize = 1;

/// The reference frontend: compiles with this crate's parser and runs on
/// the bytecode VM.
#[derive(Debug, Default)]
pub struct Interpreter {
    runs: u64,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of code objects run so far, imports included.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    fn compile_source(&mut self, rt: &mut Runtime, source: &str, source_name: Qstr, kind: InputKind) -> PyResult<Code> {
        let stmts = tokenize(source).and_then(|toks| Parser::new(&toks, *rt.stack_ctrl()).parse_file());
        match stmts {
            Ok(stmts) => Ok(compile_module(rt, &stmts, source_name, kind)),
            Err(e) => {
                debug!(error = %e, "compile failed");
                Err(e.raise(rt, source_name))
            }
        }
    }

    /// Run `code` against `globals`, which the caller keeps reachable.
    pub fn run_code(&mut self, rt: &mut Runtime, code: &Code, globals: Value) -> PyResult<Value> {
        rt.stack_check()?;
        self.runs += 1;
        let frame = rt.frame_alloc(STACK_BASE + code.stack_size)?;
        rt.frame_set(frame, GLOBALS, globals);
        let mut pc = 0;
        let result = self.exec(rt, code, frame, &mut pc);
        rt.frame_free(frame);
        result.map_err(|Raised(e)| {
            exc::set_location(rt, e, code.source_name, code.line_of(pc));
            Raised(e)
        })
    }

    fn exec(&mut self, rt: &mut Runtime, code: &Code, frame: Frame, pc: &mut usize) -> PyResult<Value> {
        let mut sp = STACK_BASE;
        while *pc < code.ops.len() {
            match code.ops[*pc] {
                Op::LoadConst(v) => {
                    rt.frame_set(frame, sp, v);
                    sp += 1;
                }
                Op::LoadName(q) => {
                    let globals = rt.frame_get(frame, GLOBALS);
                    let v = load_name(rt, globals, q)?;
                    rt.frame_set(frame, sp, v);
                    sp += 1;
                }
                Op::StoreName(q) => {
                    let (globals, v) = (rt.frame_get(frame, GLOBALS), rt.frame_get(frame, sp - 1));
                    dict::store(rt, globals, q, v)?;
                    sp -= 1;
                }
                Op::LoadAttr(q) => {
                    let obj = rt.frame_get(frame, sp - 1);
                    let v = ops::load_attr(rt, obj, q)?;
                    rt.frame_set(frame, sp - 1, v);
                }
                Op::Call(n) => {
                    let n = n as usize;
                    let f = rt.frame_get(frame, sp - 1 - n);
                    let args: Vec<Value> = (sp - n..sp).map(|i| rt.frame_get(frame, i)).collect();
                    let r = ops::call(rt, f, &args)?;
                    sp -= n;
                    rt.frame_set(frame, sp - 1, r);
                }
                Op::Binary(op) => {
                    let (a, b) = (rt.frame_get(frame, sp - 2), rt.frame_get(frame, sp - 1));
                    let r = ops::binary_op(rt, op, a, b)?;
                    sp -= 1;
                    rt.frame_set(frame, sp - 1, r);
                }
                Op::Neg => {
                    let v = rt.frame_get(frame, sp - 1);
                    let r = ops::unary_neg(rt, v)?;
                    rt.frame_set(frame, sp - 1, r);
                }
                Op::Raise => {
                    let v = rt.frame_get(frame, sp - 1);
                    return Err(raise_value(rt, v));
                }
                Op::Reraise => {
                    return Err(rt.raise_msg(ExcType::RuntimeError, "no active exception to reraise"));
                }
                Op::Import(q) => {
                    self.import(rt, frame, sp, q)?;
                    sp += 1;
                }
                Op::Pop => sp -= 1,
                Op::PrintExpr => {
                    let v = rt.frame_get(frame, sp - 1);
                    if !v.is_none() {
                        let mut text = ops::repr_of(rt, v);
                        text.push('\n');
                        rt.out().write(&text);
                    }
                    sp -= 1;
                }
            }
            *pc += 1;
        }
        Ok(Value::NONE)
    }

    /// Resolve `import name` into frame slot `slot`.
    ///
    /// Already-loaded and builtin modules come first; otherwise `name.py` is
    /// looked up through the VFS and run in a fresh module namespace. The
    /// module is registered before its body runs and dropped again if the
    /// body fails.
    fn import(&mut self, rt: &mut Runtime, frame: Frame, slot: usize, name: Qstr) -> PyResult<()> {
        let found = dict::lookup(rt, rt.loaded_modules(), name).or_else(|| dict::lookup(rt, rt.builtin_modules(), name));
        if let Some(m) = found {
            rt.frame_set(frame, slot, m);
            return Ok(());
        }

        let path = format!("{}.py", rt.qstr_str(name));
        if rt.vfs().import_stat(&path) != ImportStat::File {
            let msg = format!("no module named '{}'", rt.qstr_str(name));
            return Err(rt.raise_msg(ExcType::ImportError, &msg));
        }
        let source = match rt.vfs().open(&path) {
            Ok(Some(source)) => source,
            Ok(None) => {
                let msg = format!("no module named '{}'", rt.qstr_str(name));
                return Err(rt.raise_msg(ExcType::ImportError, &msg));
            }
            Err(e) => return Err(rt.raise_os_error(e.errno())),
        };
        debug!(path = %path, "importing module");

        let m = module::new_module(rt, name)?;
        rt.frame_set(frame, slot, m);
        let loaded = rt.loaded_modules();
        dict::store(rt, loaded, name, m)?;

        let file = rt.intern(&path);
        let result = self
            .compile_source(rt, &source, file, InputKind::Statements)
            .and_then(|code| match module::module_globals(rt, m) {
                Some(globals) => self.run_code(rt, &code, globals),
                None => Ok(Value::NONE),
            });
        if let Err(e) = result {
            dict::remove(rt, loaded, name);
            return Err(e);
        }
        Ok(())
    }
}

fn load_name(rt: &mut Runtime, globals: Value, q: Qstr) -> PyResult<Value> {
    if let Some(v) = dict::lookup(rt, globals, q).or_else(|| dict::lookup(rt, rt.builtins(), q)) {
        return Ok(v);
    }
    let msg = format!("name '{}' isn't defined", rt.qstr_str(q));
    Err(rt.raise_msg(ExcType::NameError, &msg))
}

/// `raise v`: instances are raised as-is, exception types are instantiated.
fn raise_value(rt: &mut Runtime, v: Value) -> Raised {
    if exc::is_exception(rt, v) {
        return rt.raise(v);
    }
    match v.as_exc_type() {
        Some(ty) => rt.raise_type(ty),
        None => rt.raise_msg(ExcType::TypeError, "exceptions must derive from BaseException"),
    }
}

impl Frontend for Interpreter {
    type Code = Code;

    fn compile(&mut self, rt: &mut Runtime, source: &str, source_name: Qstr, kind: InputKind) -> PyResult<Code> {
        self.compile_source(rt, source, source_name, kind)
    }

    fn call0(&mut self, rt: &mut Runtime, code: &Code) -> PyResult<Value> {
        let globals = rt.main_globals();
        self.run_code(rt, code, globals)
    }
}
