//! Static checks run after parsing and before any code executes.

use std::collections::HashMap;

use crate::ast::{Block, Expr, ExprKind, FunctionDecl, Item, SourceFile, StmtKind};
use crate::builtins;
use crate::error::LoadError;
use crate::modules;
use crate::program::ENTRY_POINT;

/// Reject programs that import or call outside the allow-lists, call
/// functions that do not exist, or lack a usable entry point.
pub fn check(file: &SourceFile) -> Result<(), LoadError> {
    for item in &file.items {
        if let Item::Import { module, .. } = item {
            if !modules::is_allowed(module) {
                return Err(import_denied(module));
            }
        }
    }

    let mut functions: HashMap<&str, &FunctionDecl> = HashMap::new();
    for item in &file.items {
        if let Item::Function(decl) = item {
            if builtins::lookup(&decl.name).is_some() {
                return Err(LoadError::ShadowsBuiltin {
                    name: decl.name.clone(),
                });
            }
            if functions.insert(&decl.name, decl).is_some() {
                return Err(LoadError::DuplicateFunction {
                    name: decl.name.clone(),
                });
            }
        }
    }

    let checker = CallChecker { functions: &functions };
    for item in &file.items {
        match item {
            Item::Function(decl) => checker.block(&decl.body)?,
            Item::Global { value, .. } => checker.expr(value)?,
            Item::Import { .. } => {}
        }
    }

    match functions.get(ENTRY_POINT) {
        None => Err(LoadError::MissingEntryPoint {
            name: ENTRY_POINT.to_string(),
        }),
        Some(decl) if decl.params.len() != 1 => Err(LoadError::EntryPointSignature {
            name: ENTRY_POINT.to_string(),
            params: decl.params.len(),
        }),
        Some(_) => Ok(()),
    }
}

pub(crate) fn import_denied(module: &str) -> LoadError {
    LoadError::ImportDenied {
        module: module.to_string(),
        allowed: modules::allowed_list(),
    }
}

struct CallChecker<'a> {
    functions: &'a HashMap<&'a str, &'a FunctionDecl>,
}

impl CallChecker<'_> {
    fn block(&self, block: &Block) -> Result<(), LoadError> {
        for stmt in block {
            match &stmt.kind {
                StmtKind::Let { value, .. } => self.expr(value)?,
                StmtKind::Assign { target, value, .. } => {
                    for index in &target.indices {
                        self.expr(index)?;
                    }
                    self.expr(value)?;
                }
                StmtKind::If {
                    branches,
                    otherwise,
                } => {
                    for (condition, body) in branches {
                        self.expr(condition)?;
                        self.block(body)?;
                    }
                    if let Some(body) = otherwise {
                        self.block(body)?;
                    }
                }
                StmtKind::While { condition, body } => {
                    self.expr(condition)?;
                    self.block(body)?;
                }
                StmtKind::For { iterable, body, .. } => {
                    self.expr(iterable)?;
                    self.block(body)?;
                }
                StmtKind::Return(Some(value)) | StmtKind::Expr(value) => self.expr(value)?,
                // Function-level imports are checked when they execute.
                StmtKind::Return(None)
                | StmtKind::Break
                | StmtKind::Continue
                | StmtKind::Import { .. } => {}
            }
        }
        Ok(())
    }

    fn expr(&self, expr: &Expr) -> Result<(), LoadError> {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Var(_) => Ok(()),
            ExprKind::List(items) => items.iter().try_for_each(|e| self.expr(e)),
            ExprKind::Map(entries) => entries.iter().try_for_each(|(k, v)| {
                self.expr(k)?;
                self.expr(v)
            }),
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)
            }
            ExprKind::Index { target, index } => {
                self.expr(target)?;
                self.expr(index)
            }
            ExprKind::DynamicImport(name) => self.expr(name),
            ExprKind::Call { name, args } => {
                let (expected, accepted) = match (builtins::lookup(name), self.functions.get(name.as_str())) {
                    (Some(native), _) => (native.arity(), native.accepts(args.len())),
                    (None, Some(decl)) => (decl.params.len().to_string(), decl.params.len() == args.len()),
                    (None, None) => {
                        return Err(LoadError::UndefinedFunction {
                            name: name.clone(),
                            line: expr.line,
                        })
                    }
                };
                if !accepted {
                    return Err(LoadError::Arity {
                        name: name.clone(),
                        expected,
                        found: args.len(),
                        line: expr.line,
                    });
                }
                args.iter().try_for_each(|e| self.expr(e))
            }
            ExprKind::ModuleCall {
                module,
                function,
                args,
            } => {
                if !modules::is_allowed(module) {
                    return Err(import_denied(module));
                }
                let native = modules::lookup(module, function).ok_or_else(|| LoadError::UnknownFunction {
                    module: module.clone(),
                    function: function.clone(),
                    line: expr.line,
                })?;
                if !native.accepts(args.len()) {
                    return Err(LoadError::Arity {
                        name: native.qualified.to_string(),
                        expected: native.arity(),
                        found: args.len(),
                        line: expr.line,
                    });
                }
                args.iter().try_for_each(|e| self.expr(e))
            }
        }
    }
}
